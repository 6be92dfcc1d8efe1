//! Queue status, wait estimates and live updates

use super::with_state;
use crate::state::{AppState, QueueStatus};
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;
use warp::filters::BoxedFilter;
use warp::sse::Event;
use warp::{Filter, Reply};

/// Query for `GET /api/queue/estimate`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EstimateQuery {
    /// Defaults to the current queue length
    pub items: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    queue_length: usize,
    estimated_wait_ms: u64,
    processing: bool,
    requests_per_minute: u32,
    min_interval_ms: u64,
    max_pending: usize,
    total_enqueued: u64,
    total_succeeded: u64,
    total_failed: u64,
    total_rejected: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EstimateBody {
    items: usize,
    estimated_wait_ms: u64,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Queue status and wait estimates
pub fn routes(state: Arc<AppState>) -> BoxedFilter<(warp::reply::Response,)> {
    let status_route = warp::path!("api" / "queue" / "status")
        .and(warp::get())
        .and(with_state(Arc::clone(&state)))
        .and_then(status);

    let estimate_route = warp::path!("api" / "queue" / "estimate")
        .and(warp::get())
        .and(warp::query::<EstimateQuery>())
        .and(with_state(Arc::clone(&state)))
        .and_then(estimate);

    let events_route = warp::path!("api" / "queue" / "events")
        .and(warp::get())
        .and(with_state(state))
        .map(|state: Arc<AppState>| events(&state));

    status_route
        .or(estimate_route)
        .unify()
        .or(events_route)
        .unify()
        .boxed()
}

/// Queue depth, configuration and counters
///
/// GET /api/queue/status
pub async fn status(state: Arc<AppState>) -> Result<warp::reply::Response, Infallible> {
    let queue = state.queue();
    let snapshot = queue.snapshot();
    let stats = queue.stats();
    let body = StatusBody {
        queue_length: snapshot.queue_length,
        estimated_wait_ms: millis(snapshot.estimated_wait),
        processing: queue.is_draining(),
        requests_per_minute: queue.config().requests_per_minute,
        min_interval_ms: millis(queue.min_interval()),
        max_pending: queue.config().max_pending,
        total_enqueued: stats.total_enqueued,
        total_succeeded: stats.total_succeeded,
        total_failed: stats.total_failed,
        total_rejected: stats.total_rejected,
    };
    Ok(warp::reply::json(&body).into_response())
}

/// Wait for `items` requests, or for the current queue when omitted
///
/// GET /api/queue/estimate?items=N
pub async fn estimate(
    query: EstimateQuery,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Infallible> {
    let items = query.items.unwrap_or_else(|| state.queue().queue_length());
    let body = EstimateBody {
        items,
        estimated_wait_ms: millis(state.queue().estimated_wait(Some(items))),
    };
    Ok(warp::reply::json(&body).into_response())
}

fn status_event(status: QueueStatus) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&status).unwrap_or_default();
    Ok(Event::default().event("queue").data(data))
}

/// Current status followed by every change, until the client disconnects
fn status_stream(
    current: QueueStatus,
    rx: broadcast::Receiver<QueueStatus>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let updates = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(status) => return Some((status, rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "queue event listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    stream::once(async move { current })
        .chain(updates)
        .map(status_event)
}

/// Server-sent queue snapshots
///
/// GET /api/queue/events
pub fn events(state: &AppState) -> warp::reply::Response {
    let rx = state.subscribe_queue();
    let stream = status_stream(state.queue_status(), rx);
    warp::sse::reply(warp::sse::keep_alive().stream(stream)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_starts_with_current_status() {
        let (tx, rx) = broadcast::channel(4);
        let current = QueueStatus {
            queue_length: 2,
            estimated_wait_ms: 8000,
        };
        let mut stream = Box::pin(status_stream(current, rx));

        tx.send(QueueStatus {
            queue_length: 1,
            estimated_wait_ms: 4000,
        })
        .unwrap();
        drop(tx);

        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }
}
