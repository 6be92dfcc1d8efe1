//! HTTP routes for the Scorecard API.
//!
//! - `health`: liveness and queue summary
//! - `queue`: queue status, wait estimates and the live event stream
//! - `reports`: report storage, deletion and whole-report generation
//! - `shared`: public lookups by share token
//! - `gemini`: single advice requests with fallback content

/// Gemini endpoints
pub mod gemini;
/// Health endpoints
pub mod health;
/// Queue endpoints
pub mod queue;
/// Reports endpoints
pub mod reports;
/// Shared endpoints
pub mod shared;

use crate::error::handle_rejection;
use crate::state::AppState;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::filters::BoxedFilter;
use warp::{Filter, Reply};

/// Largest accepted JSON body
pub const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

/// Every route with JSON error handling
pub fn api(state: Arc<AppState>) -> BoxedFilter<(warp::reply::Response,)> {
    health::routes(Arc::clone(&state))
        .or(queue::routes(Arc::clone(&state)))
        .unify()
        .or(reports::routes(Arc::clone(&state)))
        .unify()
        .or(shared::routes(Arc::clone(&state)))
        .unify()
        .or(gemini::routes(state))
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::trace::request())
        .map(Reply::into_response)
        .boxed()
}

pub(crate) fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&state))
}

pub(crate) fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// `{ "success": true, "data": ... }`
pub(crate) fn success<T: Serialize>(data: &T) -> warp::reply::Response {
    warp::reply::json(&serde_json::json!({ "success": true, "data": data })).into_response()
}
