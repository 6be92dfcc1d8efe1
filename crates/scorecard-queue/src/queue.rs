//! Rate-limited FIFO queue
//!
//! Admits asynchronous work, runs it one item at a time, and keeps at least
//! `min_interval` between two execution starts. The spacing is a fixed-gap
//! approximation of a per-minute quota: bursts are never sent faster than
//! the ceiling allows, at the price of idling when work is sparse.

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::observer::{QueueObservers, QueueSnapshot, SubscriptionId};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};

/// How one queued item settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Failed,
    Panicked,
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, Outcome> + Send>;

/// An admitted unit of work waiting for its turn
struct QueuedItem {
    id: u64,
    job: Job,
    enqueued_at: Instant,
}

/// Queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Items admitted
    pub total_enqueued: u64,
    /// Items whose work has started
    pub total_started: u64,
    /// Items whose work returned `Ok`
    pub total_succeeded: u64,
    /// Items whose work returned `Err` or panicked
    pub total_failed: u64,
    /// Admissions refused for capacity
    pub total_rejected: u64,
}

struct QueueState {
    pending: VecDeque<QueuedItem>,
    draining: bool,
    in_flight: bool,
    last_started: Option<Instant>,
    next_id: u64,
    stats: QueueStats,
}

impl QueueState {
    /// Items admitted and not yet settled, the running one included
    fn outstanding(&self) -> usize {
        self.pending.len() + usize::from(self.in_flight)
    }

    /// Throttle still owed before the next start
    fn wait_owed(&self, min_interval: Duration) -> Duration {
        self.last_started
            .map_or(Duration::ZERO, |last| min_interval.saturating_sub(last.elapsed()))
    }

    /// Pop the head item and mark it started
    fn start_next(&mut self) -> Option<QueuedItem> {
        let item = self.pending.pop_front()?;
        self.in_flight = true;
        self.last_started = Some(Instant::now());
        self.stats.total_started += 1;
        Some(item)
    }
}

struct Inner {
    config: QueueConfig,
    min_interval: Duration,
    state: Mutex<QueueState>,
    observers: QueueObservers,
}

impl Inner {
    fn estimate(&self, count: usize) -> Duration {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.min_interval.saturating_mul(count)
    }

    fn snapshot_for(&self, queue_length: usize) -> QueueSnapshot {
        QueueSnapshot {
            queue_length,
            estimated_wait: self.estimate(queue_length),
        }
    }
}

/// Serializing, spacing queue in front of a rate-limited provider
///
/// Cloning is cheap and every clone shares the same pending sequence.
#[derive(Clone)]
pub struct RateLimitedQueue {
    inner: Arc<Inner>,
}

impl RateLimitedQueue {
    /// Create new queue
    ///
    /// # Errors
    /// - `QueueError::InvalidConfig` if the configuration does not validate
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;
        let min_interval = config.min_interval();

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                min_interval,
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    draining: false,
                    in_flight: false,
                    last_started: None,
                    next_id: 0,
                    stats: QueueStats::default(),
                }),
                observers: QueueObservers::new(),
            }),
        })
    }

    /// Queue `work` and wait for it to run.
    ///
    /// Resolves with exactly what `work` produced. Capacity rejection and
    /// panics inside `work` are converted into the caller's error type.
    ///
    /// # Errors
    /// - `QueueError::CapacityExceeded` (converted) when the queue is full
    /// - `QueueError::WorkPanicked` (converted) when `work` panics
    /// - any error returned by `work`
    pub async fn enqueue<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<QueueError> + Send + 'static,
    {
        self.submit(work)?.await
    }

    /// Admit `work` without waiting for it.
    ///
    /// Admission is decided synchronously; the returned [`Pending`] resolves
    /// once the work has run. When the queue is idle and no spacing is owed
    /// the item starts during this call and never counts as queued. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    /// - `QueueError::CapacityExceeded` if `max_pending` items are admitted
    ///   and unsettled, the running one included
    pub fn submit<F, Fut, T, E>(&self, work: F) -> Result<Pending<T, E>, QueueError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<QueueError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            async move {
                let settled = AssertUnwindSafe(async move { work().await })
                    .catch_unwind()
                    .await;

                let (result, outcome) = match settled {
                    Ok(Ok(value)) => (Ok(value), Outcome::Succeeded),
                    Ok(Err(err)) => (Err(err), Outcome::Failed),
                    Err(panic) => (
                        Err(E::from(QueueError::WorkPanicked(panic_message(panic.as_ref())))),
                        Outcome::Panicked,
                    ),
                };

                // The caller may have stopped waiting
                let _ = tx.send(result);
                outcome
            }
            .boxed()
        });

        let max = self.inner.config.max_pending;
        let (snapshot, position, start_drain, first) = {
            let mut state = self.inner.state.lock();

            if state.outstanding() >= max {
                state.stats.total_rejected += 1;
                tracing::warn!(max, "queue at capacity, rejecting work");
                return Err(QueueError::CapacityExceeded { max });
            }

            let id = state.next_id;
            state.next_id += 1;
            state.pending.push_back(QueuedItem {
                id,
                job,
                enqueued_at: Instant::now(),
            });
            state.stats.total_enqueued += 1;

            let position = state.outstanding();
            let start_drain = !state.draining;
            state.draining = true;

            // An idle queue with no spacing owed starts the item right here
            let first = if start_drain && state.wait_owed(self.inner.min_interval).is_zero() {
                state.start_next()
            } else {
                None
            };

            tracing::debug!(item = id, position, started = first.is_some(), "work enqueued");
            let queue_length = state.pending.len();
            (self.inner.snapshot_for(queue_length), position, start_drain, first)
        };

        self.inner.observers.notify(snapshot);

        if start_drain {
            tokio::spawn(drain(Arc::clone(&self.inner), first));
        }

        Ok(Pending { rx, position })
    }

    /// Items admitted but not yet started
    #[inline]
    #[must_use]
    pub fn queue_length(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Time to work through `count` items, or the current queue when `None`
    #[inline]
    #[must_use]
    pub fn estimated_wait(&self, count: Option<usize>) -> Duration {
        let count = count.unwrap_or_else(|| self.queue_length());
        self.inner.estimate(count)
    }

    /// Current queue length and wait estimate
    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        let queue_length = self.queue_length();
        self.inner.snapshot_for(queue_length)
    }

    /// Items admitted and not yet settled, including the one running
    #[inline]
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.inner.state.lock().outstanding()
    }

    /// Whether a drain loop is running
    #[inline]
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.inner.state.lock().draining
    }

    /// Queue counters
    #[inline]
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.inner.state.lock().stats
    }

    /// Spacing between execution starts
    #[inline]
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.inner.min_interval
    }

    /// Queue configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Register an observer alongside existing ones
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(QueueSnapshot) + Send + Sync + 'static,
    {
        self.inner.observers.subscribe(callback)
    }

    /// Remove an observer
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.observers.unsubscribe(id)
    }

    /// Install `callback` as the only observer, or clear all with `None`
    pub fn set_queue_update_callback<F>(&self, callback: Option<F>) -> Option<SubscriptionId>
    where
        F: Fn(QueueSnapshot) + Send + Sync + 'static,
    {
        self.inner.observers.replace(callback)
    }
}

impl fmt::Debug for RateLimitedQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedQueue")
            .field("config", &self.inner.config)
            .field("queue_length", &self.queue_length())
            .field("observers", &self.inner.observers)
            .finish_non_exhaustive()
    }
}

/// Outcome of admitted work, resolved once it has run
#[must_use = "dropping a Pending discards the work's result, not the work"]
pub struct Pending<T, E> {
    rx: oneshot::Receiver<Result<T, E>>,
    position: usize,
}

impl<T, E> Pending<T, E> {
    /// 1-based position among unsettled items at admission
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }
}

impl<T, E: From<QueueError>> Future for Pending<T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(E::from(QueueError::Abandoned))))
    }
}

impl<T, E> fmt::Debug for Pending<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// Drain loop; only one runs per queue at a time.
///
/// `first` was already started at admission and runs before anything else.
async fn drain(inner: Arc<Inner>, mut first: Option<QueuedItem>) {
    tracing::debug!("drain loop started");

    loop {
        let item = if let Some(item) = first.take() {
            item
        } else {
            let wait = {
                let mut state = inner.state.lock();
                if state.pending.is_empty() {
                    state.draining = false;
                    break;
                }
                state.wait_owed(inner.min_interval)
            };

            if !wait.is_zero() {
                tracing::trace!(wait_ms = wait.as_millis(), "throttling next start");
                sleep(wait).await;
            }

            let next = inner.state.lock().start_next();
            let Some(item) = next else {
                continue;
            };
            item
        };

        tracing::debug!(
            item = item.id,
            waited_ms = item.enqueued_at.elapsed().as_millis(),
            "starting queued work"
        );

        let outcome = (item.job)().await;

        let queue_length = {
            let mut state = inner.state.lock();
            state.in_flight = false;
            match outcome {
                Outcome::Succeeded => state.stats.total_succeeded += 1,
                Outcome::Failed | Outcome::Panicked => state.stats.total_failed += 1,
            }
            state.pending.len()
        };

        match outcome {
            Outcome::Succeeded => tracing::debug!(item = item.id, "queued work succeeded"),
            Outcome::Failed => tracing::debug!(item = item.id, "queued work failed"),
            Outcome::Panicked => tracing::error!(item = item.id, "queued work panicked"),
        }

        inner.observers.notify(inner.snapshot_for(queue_length));
    }

    tracing::debug!("drain loop idle");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(rpm: u32, max_pending: usize) -> RateLimitedQueue {
        RateLimitedQueue::new(
            QueueConfig::new()
                .with_requests_per_minute(rpm)
                .with_max_pending(max_pending),
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let result = RateLimitedQueue::new(QueueConfig::new().with_requests_per_minute(0));
        assert!(matches!(result, Err(QueueError::InvalidConfig(_))));
    }

    #[test]
    fn estimate_uses_explicit_count() {
        let q = queue(15, 10);
        assert_eq!(q.estimated_wait(Some(3)), Duration::from_millis(12_000));
        assert_eq!(q.estimated_wait(None), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_returns_work_result() {
        let q = queue(15, 10);
        let value: u32 = q
            .enqueue(|| async { Ok::<_, QueueError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(q.stats().total_succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panic_becomes_error_for_that_item() {
        let q = queue(15, 10);
        let result: Result<(), QueueError> = q
            .enqueue(|| async {
                if true {
                    panic!("generator exploded");
                }
                Ok(())
            })
            .await;

        assert_eq!(
            result,
            Err(QueueError::WorkPanicked("generator exploded".to_string()))
        );
        assert_eq!(q.stats().total_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_reports_position() {
        let q = queue(15, 10);
        let first = q.submit(|| async { Ok::<_, QueueError>(()) }).unwrap();
        let second = q.submit(|| async { Ok::<_, QueueError>(()) }).unwrap();

        assert_eq!(first.position(), 1);
        assert_eq!(second.position(), 2);

        first.await.unwrap();
        second.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_queue_starts_first_item_at_admission() {
        let q = queue(15, 10);
        let first = q.submit(|| async { Ok::<_, QueueError>(()) }).unwrap();

        assert_eq!(q.queue_length(), 0);
        assert_eq!(q.outstanding(), 1);
        assert_eq!(q.stats().total_started, 1);

        first.await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(q.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn owed_spacing_defers_start_to_drain() {
        let q = queue(15, 10);
        q.enqueue(|| async { Ok::<_, QueueError>(()) }).await.unwrap();
        tokio::task::yield_now().await;

        let second = q.submit(|| async { Ok::<_, QueueError>(()) }).unwrap();
        assert_eq!(q.queue_length(), 1);
        assert_eq!(q.stats().total_started, 1);

        second.await.unwrap();
        assert_eq!(q.stats().total_started, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn draining_flag_clears_when_empty() {
        let q = queue(15, 10);
        q.enqueue(|| async { Ok::<_, QueueError>(()) }).await.unwrap();

        tokio::task::yield_now().await;
        assert!(!q.is_draining());
        assert_eq!(q.queue_length(), 0);
    }

    #[test]
    fn panic_message_extraction() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(5_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
