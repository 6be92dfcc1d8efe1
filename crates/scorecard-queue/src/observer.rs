//! Queue state observers
//!
//! Observers receive a [`QueueSnapshot`] after every admission and after
//! every completed drain step. Any number may be registered; the single-slot
//! registration of [`QueueObservers::replace`] is kept for callers that only
//! ever want one progress display.

use parking_lot::RwLock;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Queue depth and wait estimate at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Items admitted but not yet started
    pub queue_length: usize,
    /// `queue_length` times the minimum interval
    pub estimated_wait: Duration,
}

/// Handle returned when registering an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Callback = Arc<dyn Fn(QueueSnapshot) + Send + Sync>;

/// Registry of queue observers
#[derive(Default)]
pub struct QueueObservers {
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(SubscriptionId, Callback)>>,
}

impl QueueObservers {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer alongside the existing ones
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(QueueSnapshot) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().push((id, Arc::new(callback)));
        id
    }

    /// Remove one observer; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    /// Replace every observer with `callback`, or clear them all with `None`
    pub fn replace<F>(&self, callback: Option<F>) -> Option<SubscriptionId>
    where
        F: Fn(QueueSnapshot) + Send + Sync + 'static,
    {
        let mut callbacks = self.callbacks.write();
        callbacks.clear();
        callback.map(|callback| {
            let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
            callbacks.push((id, Arc::new(callback) as Callback));
            id
        })
    }

    /// Number of registered observers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Whether no observer is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Deliver a snapshot to every observer.
    ///
    /// Callbacks run outside the registry lock so they may register or
    /// remove observers themselves. A panicking callback is logged and
    /// skipped.
    pub fn notify(&self, snapshot: QueueSnapshot) {
        let callbacks: Vec<(SubscriptionId, Callback)> = self.callbacks.read().clone();

        for (id, callback) in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
                tracing::warn!(subscription = %id, "queue observer panicked");
            }
        }
    }
}

impl fmt::Debug for QueueObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueObservers")
            .field("count", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn snapshot(queue_length: usize) -> QueueSnapshot {
        QueueSnapshot {
            queue_length,
            estimated_wait: Duration::from_secs(4) * u32::try_from(queue_length).unwrap(),
        }
    }

    #[test]
    fn every_subscriber_is_notified() {
        let observers = QueueObservers::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            observers.subscribe(move |s| seen.lock().push((tag, s.queue_length)));
        }

        observers.notify(snapshot(3));

        assert_eq!(*seen.lock(), vec![("a", 3), ("b", 3)]);
    }

    #[test]
    fn replace_keeps_single_slot_semantics() {
        let observers = QueueObservers::new();
        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));

        let f = Arc::clone(&first);
        observers.replace(Some(move |_| *f.lock() += 1));
        let s = Arc::clone(&second);
        observers.replace(Some(move |_| *s.lock() += 1));

        observers.notify(snapshot(1));
        assert_eq!(*first.lock(), 0);
        assert_eq!(*second.lock(), 1);

        observers.replace(None::<fn(QueueSnapshot)>);
        assert!(observers.is_empty());
    }

    #[test]
    fn unsubscribe_removes_only_that_observer() {
        let observers = QueueObservers::new();
        let a = observers.subscribe(|_| {});
        let _b = observers.subscribe(|_| {});

        assert!(observers.unsubscribe(a));
        assert!(!observers.unsubscribe(a));
        assert_eq!(observers.len(), 1);
    }

    #[test]
    fn panicking_observer_does_not_block_others() {
        let observers = QueueObservers::new();
        let hits = Arc::new(Mutex::new(0));

        observers.subscribe(|_| panic!("display crashed"));
        let h = Arc::clone(&hits);
        observers.subscribe(move |_| *h.lock() += 1);

        observers.notify(snapshot(0));
        assert_eq!(*hits.lock(), 1);
    }
}
