//! Application configuration
//!
//! Layering, lowest to highest precedence:
//! - built-in defaults
//! - optional TOML file
//! - environment (`GEMINI_API_KEY`, `SCORECARD_DELETE_KEY`, `SCORECARD_BIND`)
//! - command-line flags, applied by the binary through the `with_*` setters

use crate::error::ConfigError;
use scorecard_queue::QueueConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the Gemini API key
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
/// Environment variable holding the report deletion secret
pub const ENV_DELETE_KEY: &str = "SCORECARD_DELETE_KEY";
/// Environment variable holding the listen address
pub const ENV_BIND: &str = "SCORECARD_BIND";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener
    pub server: ServerConfig,
    /// Generation queue rate and capacity
    pub queue: QueueConfig,
    /// Text generation provider
    pub gemini: GeminiConfig,
    /// Advice caches
    pub cache: CacheConfig,
    /// Shared secrets
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = present(ENV_API_KEY) {
            self.gemini.api_key = Some(key);
        }
        if let Some(key) = present(ENV_DELETE_KEY) {
            self.auth.delete_key = Some(key);
        }
        if let Some(bind) = present(ENV_BIND) {
            self.server.bind = parse_bind(&bind)?;
        }
        Ok(self)
    }

    /// With listen address
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.server.bind = bind;
        self
    }

    /// With queue settings
    #[inline]
    #[must_use]
    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    /// With Gemini settings
    #[inline]
    #[must_use]
    pub fn with_gemini(mut self, gemini: GeminiConfig) -> Self {
        self.gemini = gemini;
        self
    }

    /// With deletion secret
    #[inline]
    #[must_use]
    pub fn with_delete_key(mut self, key: impl Into<String>) -> Self {
        self.auth.delete_key = Some(key.into());
        self
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()?;
        if self.gemini.model.trim().is_empty() {
            return Err(ConfigError::Invalid("gemini.model must not be empty".into()));
        }
        if self.gemini.timeout_secs == 0 {
            return Err(ConfigError::Invalid("gemini.timeout_secs must be > 0".into()));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid("cache.max_entries must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_bind(value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("invalid bind address: {value}")))
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// Gemini provider settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// Provider API key; generation is disabled without one
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Provider base URL
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// With API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// With model name
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With API base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash-exp".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Advice cache settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries per advice kind
    pub max_entries: u64,
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// Entry lifetime
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl_secs: 3600,
        }
    }
}

/// Report deletion secret
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret required to delete reports; deletion is disabled without one
    pub delete_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("delete_key", &self.delete_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
