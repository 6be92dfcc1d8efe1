//! Public report lookups by share token

use super::{success, with_state};
use crate::error::ApiError;
use crate::state::AppState;
use std::sync::Arc;
use warp::filters::BoxedFilter;
use warp::{Filter, Rejection};

/// Public lookups by share token
pub fn routes(state: Arc<AppState>) -> BoxedFilter<(warp::reply::Response,)> {
    warp::path!("api" / "shared" / String / String)
        .and(warp::get())
        .and(with_state(state))
        .and_then(shared)
        .boxed()
}

/// A whole report or a single student, by share token
///
/// GET /api/shared/{report|student}/{token}
pub async fn shared(
    kind: String,
    token: String,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Rejection> {
    match kind.as_str() {
        "report" => {
            let report = state
                .store
                .report_by_token(&token)
                .await
                .map_err(|e| ApiError::from(e).reject())?;
            Ok(success(&report))
        }
        "student" => {
            let student = state
                .store
                .student_by_token(&token)
                .await
                .map_err(|e| ApiError::from(e).reject())?;
            Ok(success(&student))
        }
        _ => Err(ApiError::bad_request("Invalid report type").reject()),
    }
}
