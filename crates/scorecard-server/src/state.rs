//! Application state shared by all handlers

use crate::error::ServerError;
use scorecard_core::{
    AppConfig, GeminiClient, InMemoryReportStore, ReportAdvisor, ReportFactory, ReportStore,
    TextGenerator, ToeflScale,
};
use scorecard_queue::{QueueSnapshot, RateLimitedQueue, SubscriptionId};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

const QUEUE_EVENT_CAPACITY: usize = 256;

/// Queue depth and wait estimate as sent to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Requests waiting to start
    pub queue_length: usize,
    /// Time until the last of them starts
    pub estimated_wait_ms: u64,
}

impl From<QueueSnapshot> for QueueStatus {
    fn from(snapshot: QueueSnapshot) -> Self {
        Self {
            queue_length: snapshot.queue_length,
            estimated_wait_ms: u64::try_from(snapshot.estimated_wait.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Shared state
pub struct AppState {
    /// Config
    pub config: AppConfig,
    /// Cached, queued advice generation
    pub advisor: Arc<ReportAdvisor>,
    /// Whole-report generation with progress events
    pub factory: ReportFactory,
    /// Report persistence
    pub store: Arc<dyn ReportStore>,
    queue_events: broadcast::Sender<QueueStatus>,
    subscription: SubscriptionId,
}

impl AppState {
    /// Build state from configuration with the Gemini client and an
    /// in-memory store
    pub fn from_config(config: AppConfig) -> Result<Self, ServerError> {
        let generator = Arc::new(GeminiClient::new(&config.gemini)?);
        Self::new(config, generator, Arc::new(InMemoryReportStore::new()))
    }

    /// Build state around explicit collaborators
    pub fn new(
        config: AppConfig,
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn ReportStore>,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let queue = RateLimitedQueue::new(config.queue.clone()).map_err(scorecard_core::ConfigError::from)?;
        let (queue_events, _) = broadcast::channel(QUEUE_EVENT_CAPACITY);
        let sender = queue_events.clone();
        let subscription = queue.subscribe(move |snapshot| {
            // No listeners is fine
            let _ = sender.send(QueueStatus::from(snapshot));
        });

        info!(
            requests_per_minute = config.queue.requests_per_minute,
            max_pending = config.queue.max_pending,
            "generation queue ready"
        );

        let advisor = Arc::new(ReportAdvisor::new(
            queue,
            generator,
            Arc::new(ToeflScale),
            config.cache,
        ));
        let factory = ReportFactory::new(Arc::clone(&advisor));

        Ok(Self {
            config,
            advisor,
            factory,
            store,
            queue_events,
            subscription,
        })
    }

    /// The shared generation queue
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &RateLimitedQueue {
        self.advisor.queue()
    }

    /// Current queue status
    #[must_use]
    pub fn queue_status(&self) -> QueueStatus {
        QueueStatus::from(self.queue().snapshot())
    }

    /// Receive every queue change
    #[must_use]
    pub fn subscribe_queue(&self) -> broadcast::Receiver<QueueStatus> {
        self.queue_events.subscribe()
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.queue().unsubscribe(self.subscription);
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("advisor", &self.advisor)
            .finish_non_exhaustive()
    }
}
