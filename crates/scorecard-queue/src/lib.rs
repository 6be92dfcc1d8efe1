//! Scorecard Queue - rate-limited admission for generation requests
//!
//! Serializes outbound calls to the generative-text provider:
//! - Bounded FIFO admission (full queue rejects immediately)
//! - One item in flight at a time
//! - Fixed minimum spacing between execution starts (`60s / rpm`)
//! - Queue depth and wait estimates pushed to any number of observers
//!
//! # Example
//!
//! ```rust,ignore
//! use scorecard_queue::{QueueConfig, QueueError, RateLimitedQueue};
//!
//! # async fn example() -> Result<(), QueueError> {
//! let queue = RateLimitedQueue::new(QueueConfig::new().with_requests_per_minute(15))?;
//!
//! queue.subscribe(|snapshot| {
//!     println!("{} waiting, ~{:?}", snapshot.queue_length, snapshot.estimated_wait);
//! });
//!
//! let answer: u32 = queue.enqueue(|| async { Ok::<_, QueueError>(42) }).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

/// Rate and capacity settings
pub mod config;
/// Error types
pub mod error;
/// Length subscriptions
pub mod observer;
/// The queue itself
pub mod queue;

pub use config::{QueueConfig, DEFAULT_MAX_PENDING, DEFAULT_REQUESTS_PER_MINUTE};
pub use error::QueueError;
pub use observer::{QueueObservers, QueueSnapshot, SubscriptionId};
pub use queue::{Pending, QueueStats, RateLimitedQueue};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
