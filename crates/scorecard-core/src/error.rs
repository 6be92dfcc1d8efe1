//! Error types for Scorecard Core
//!
//! Provides error handling for:
//! - Text generation (queue admission, transport, upstream, response parsing)
//! - Report persistence
//! - Configuration loading

use scorecard_queue::QueueError;
use std::path::PathBuf;

/// Generation errors
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Queue refused or lost the request
    #[error("generation queue error: {0}")]
    Queue(#[from] QueueError),

    /// Transport failure talking to the provider
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("provider returned status {status}: {body}")]
    Upstream {
        /// HTTP status
        status: u16,
        /// Response body, for logging
        body: String,
    },

    /// Provider refused the prompt
    #[error("prompt blocked by provider: {0}")]
    Blocked(String),

    /// Provider returned no candidate text
    #[error("provider returned an empty response")]
    EmptyResponse,

    /// Response text was not the JSON we asked for
    #[error("invalid json in response: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// No API key configured
    #[error("generation provider not configured: {0}")]
    NotConfigured(String),
}

impl GenerationError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Queue(err) => err.is_retryable(),
            Self::Http(_) | Self::EmptyResponse => true,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::Blocked(_) | Self::InvalidJson(_) | Self::NotConfigured(_) => false,
        }
    }

    /// Short notice suitable for showing next to fallback content
    #[must_use]
    pub fn notice(&self) -> String {
        match self {
            Self::Queue(QueueError::CapacityExceeded { .. }) => {
                "The generation queue is full. Showing default content; try again later.".to_string()
            }
            _ => "Generated content is unavailable. Showing default content.".to_string(),
        }
    }
}

/// Report store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing stored under the token
    #[error("{kind} not found: {token}")]
    NotFound {
        /// `report` or `student`
        kind: &'static str,
        /// Token that matched nothing
        token: String,
    },

    /// Rejected input
    #[error("invalid report data: {0}")]
    Invalid(String),

    /// Backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create not-found error for a report token
    #[inline]
    pub fn report_not_found(token: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "report",
            token: token.into(),
        }
    }

    /// Create not-found error for a student token
    #[inline]
    pub fn student_not_found(token: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "student",
            token: token.into(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading the config file
    #[error("io error reading {path}: {source}")]
    Io {
        /// File that failed to read
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Bad value
    #[error("invalid config value: {0}")]
    Invalid(String),

    /// Queue settings rejected
    #[error("invalid queue settings: {0}")]
    Queue(#[from] QueueError),
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_display() {
        let err = GenerationError::Upstream {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "provider returned status 503: overloaded");
    }

    #[test]
    fn generation_error_is_retryable() {
        assert!(GenerationError::Queue(QueueError::CapacityExceeded { max: 1 }).is_retryable());
        assert!(GenerationError::Upstream { status: 429, body: String::new() }.is_retryable());
        assert!(GenerationError::Upstream { status: 502, body: String::new() }.is_retryable());
        assert!(!GenerationError::Upstream { status: 400, body: String::new() }.is_retryable());
        assert!(!GenerationError::Blocked("SAFETY".into()).is_retryable());
    }

    #[test]
    fn capacity_notice_says_try_later() {
        let err = GenerationError::from(QueueError::CapacityExceeded { max: 100 });
        assert!(err.notice().contains("try again later"));
        assert!(!GenerationError::EmptyResponse.notice().contains("try again"));
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::report_not_found("abc123");
        assert_eq!(err.to_string(), "report not found: abc123");
    }

    #[test]
    fn error_conversions() {
        let err: ConfigError = QueueError::InvalidConfig("rpm".into()).into();
        assert!(matches!(err, ConfigError::Queue(_)));
    }
}
