//! Health endpoint

use super::with_state;
use crate::state::AppState;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::filters::BoxedFilter;
use warp::{Filter, Reply};

/// Liveness with queue figures
pub fn routes(state: Arc<AppState>) -> BoxedFilter<(warp::reply::Response,)> {
    warp::path!("health")
        .and(warp::get())
        .and(with_state(state))
        .and_then(health)
        .boxed()
}

/// Health check
///
/// GET /health
pub async fn health(state: Arc<AppState>) -> Result<warp::reply::Response, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "generation": {
            "model": state.config.gemini.model,
            "configured": state.config.gemini.api_key.is_some(),
        },
        "queue": state.queue_status(),
    }))
    .into_response())
}
