//! Queue configuration

use crate::error::QueueError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Provider ceiling used when nothing else is configured
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 15;

/// Unsettled items allowed before admission starts failing
pub const DEFAULT_MAX_PENDING: usize = 100;

const WINDOW_MS: u64 = 60_000;

/// Rate and capacity settings for a [`RateLimitedQueue`](crate::RateLimitedQueue)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Requests the provider allows per rolling 60 second window
    pub requests_per_minute: u32,
    /// Maximum number of admitted, unsettled items (the running one included)
    pub max_pending: usize,
}

impl QueueConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With requests per minute
    #[inline]
    #[must_use]
    pub fn with_requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = rpm;
        self
    }

    /// With pending capacity
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }

    /// Fixed spacing between two execution starts.
    ///
    /// `60000 / requests_per_minute` milliseconds, truncated. A zero rate is
    /// treated as one request per minute; [`validate`](Self::validate)
    /// rejects it before a queue is ever built.
    #[inline]
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(WINDOW_MS / u64::from(self.requests_per_minute.max(1)))
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    /// - `QueueError::InvalidConfig` for a zero rate or zero capacity
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.requests_per_minute == 0 {
            return Err(QueueError::InvalidConfig(
                "requests_per_minute must be at least 1".to_string(),
            ));
        }
        if self.max_pending == 0 {
            return Err(QueueError::InvalidConfig(
                "max_pending must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_four_seconds() {
        let config = QueueConfig::new();
        assert_eq!(config.requests_per_minute, 15);
        assert_eq!(config.min_interval(), Duration::from_millis(4000));
    }

    #[test]
    fn interval_truncates() {
        let config = QueueConfig::new().with_requests_per_minute(7);
        assert_eq!(config.min_interval(), Duration::from_millis(8571));
    }

    #[test]
    fn very_high_rate_means_no_spacing() {
        let config = QueueConfig::new().with_requests_per_minute(120_000);
        assert_eq!(config.min_interval(), Duration::ZERO);
    }

    #[test]
    fn validate_rejects_zero_values() {
        assert!(QueueConfig::new().validate().is_ok());
        assert!(matches!(
            QueueConfig::new().with_requests_per_minute(0).validate(),
            Err(QueueError::InvalidConfig(_))
        ));
        assert!(matches!(
            QueueConfig::new().with_max_pending(0).validate(),
            Err(QueueError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: QueueConfig = serde_json::from_str(r#"{"max_pending": 5}"#).unwrap();
        assert_eq!(config.max_pending, 5);
        assert_eq!(config.requests_per_minute, DEFAULT_REQUESTS_PER_MINUTE);
    }
}
