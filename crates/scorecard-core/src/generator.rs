//! Text generation provider
//!
//! [`TextGenerator`] is the seam between advice building and the remote
//! model. [`GeminiClient`] talks to the Gemini `generateContent` endpoint.

use crate::config::GeminiConfig;
use crate::error::GenerationError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Produces text for a prompt
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Request body for `models/{model}:generateContent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns
    pub contents: Vec<Content>,
    /// Blocking thresholds per harm category
    pub safety_settings: Vec<SafetySetting>,
}

impl GenerateContentRequest {
    /// Single user turn with the default safety setting
    #[must_use]
    pub fn from_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            safety_settings: vec![SafetySetting {
                category: "HARM_CATEGORY_DANGEROUS_CONTENT".to_string(),
                threshold: "BLOCK_ONLY_HIGH".to_string(),
            }],
        }
    }
}

/// One conversation turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    /// `user` or `model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Parts
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Text fragment of a turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    /// Text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Blocking threshold for one harm category
#[derive(Debug, Clone, Serialize)]
pub struct SafetySetting {
    /// Harm category, e.g. `HARM_CATEGORY_DANGEROUS_CONTENT`
    pub category: String,
    /// Blocking threshold, e.g. `BLOCK_ONLY_HIGH`
    pub threshold: String,
}

/// Response body of `generateContent`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateContentResponse {
    /// Completions; only the first is used
    pub candidates: Vec<Candidate>,
    /// Present when the prompt itself was judged
    pub prompt_feedback: Option<PromptFeedback>,
}

/// One completion
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Candidate {
    /// Content
    pub content: Option<Content>,
    /// Finish reason
    pub finish_reason: Option<String>,
}

/// Verdict on the prompt
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptFeedback {
    /// Set when the prompt was blocked
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate
    pub fn into_text(self) -> Result<String, GenerationError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GenerationError::Blocked(reason));
        }

        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Gemini REST client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GeminiClient {
    /// Create a client from settings
    ///
    /// A missing API key is accepted; every call then fails with
    /// [`GenerationError::NotConfigured`].
    pub fn new(config: &GeminiConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        if config.api_key.is_none() {
            warn!("No Gemini API key configured; generated content will fall back to defaults");
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Model name
    #[inline]
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Endpoint URL without the key
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GenerationError::NotConfigured("missing Gemini API key".to_string()))?;

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", key)])
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Gemini returned error status");
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateContentResponse = response.json().await?;
        let text = body.into_text()?;
        debug!(chars = text.len(), "Generation complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_shape() {
        let value = serde_json::to_value(GenerateContentRequest::from_prompt("hi")).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(
            value["safetySettings"][0]["category"],
            "HARM_CATEGORY_DANGEROUS_CONTENT"
        );
        assert_eq!(value["safetySettings"][0]["threshold"], "BLOCK_ONLY_HIGH");
    }

    #[test]
    fn first_candidate_text_is_returned() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] }, "finishReason": "STOP" },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(response.into_text().unwrap(), "{\"a\":1}");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        assert!(matches!(response.into_text(), Err(GenerationError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn no_candidates_is_empty_response() {
        let response = GenerateContentResponse::default();
        assert!(matches!(response.into_text(), Err(GenerationError::EmptyResponse)));
    }

    #[test]
    fn endpoint_and_debug_hide_key() {
        let config = GeminiConfig::default()
            .with_api_key("secret")
            .with_base_url("http://localhost:9999/");
        let client = GeminiClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            format!("http://localhost:9999/v1beta/models/{}:generateContent", client.model())
        );
        assert!(!format!("{client:?}").contains("secret"));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let client = GeminiClient::new(&GeminiConfig::default()).unwrap();
        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured(_)));
    }
}
