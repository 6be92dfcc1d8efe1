//! Error types for the rate-limited queue

/// Queue admission and execution errors
///
/// Failures returned by the work itself never appear here: they are handed
/// back to the caller that enqueued the work, unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Pending capacity reached, admission refused
    #[error("queue at capacity ({max} pending), try again later")]
    CapacityExceeded {
        /// Configured capacity
        max: usize,
    },

    /// The queued work panicked while running
    #[error("queued work panicked: {0}")]
    WorkPanicked(String),

    /// Completion was lost before the work settled
    #[error("queued work abandoned before completion")]
    Abandoned,

    /// Rejected configuration
    #[error("invalid queue configuration: {0}")]
    InvalidConfig(String),
}

impl QueueError {
    /// Check if resubmitting later can succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. } | Self::Abandoned)
    }

    /// Check if this is a capacity rejection
    #[inline]
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}
