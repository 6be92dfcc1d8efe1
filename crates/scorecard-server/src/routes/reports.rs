//! Report storage, deletion and generation

use super::{json_body, success, with_state};
use crate::error::ApiError;
use crate::state::AppState;
use futures::{stream, StreamExt};
use scorecard_core::{GeneratedReport, GenerationProgress, NewReport, Report, StudentScores};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::broadcast;
use tracing::{info, warn};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::sse::Event;
use warp::{Filter, Rejection, Reply};

/// Header carrying the deletion secret
pub const DELETE_KEY_HEADER: &str = "x-delete-key";

/// Body of `POST /api/reports/validate-key`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateKeyRequest {
    /// Delete key
    #[serde(default)]
    pub delete_key: String,
}

/// Body of `POST /api/reports/generate`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Score rows to generate advice for
    #[serde(default)]
    pub students_data: Vec<StudentScores>,
    /// Store the result under this group when present
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    report: GeneratedReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved: Option<Report>,
}

/// Report CRUD, generation and key checks
pub fn routes(state: Arc<AppState>) -> BoxedFilter<(warp::reply::Response,)> {
    let create_route = warp::path!("api" / "reports")
        .and(warp::post())
        .and(json_body::<NewReport>())
        .and(with_state(Arc::clone(&state)))
        .and_then(create_report);

    let list_route = warp::path!("api" / "reports")
        .and(warp::get())
        .and(with_state(Arc::clone(&state)))
        .and_then(list_reports);

    let validate_route = warp::path!("api" / "reports" / "validate-key")
        .and(warp::post())
        .and(json_body::<ValidateKeyRequest>())
        .and(with_state(Arc::clone(&state)))
        .map(|body: ValidateKeyRequest, state: Arc<AppState>| validate_key(&body, &state));

    let generate_route = warp::path!("api" / "reports" / "generate")
        .and(warp::post())
        .and(json_body::<GenerateRequest>())
        .and(with_state(Arc::clone(&state)))
        .and_then(generate_report);

    let progress_route = warp::path!("api" / "reports" / "progress")
        .and(warp::get())
        .and(with_state(Arc::clone(&state)))
        .map(|state: Arc<AppState>| progress_events(&state));

    let get_route = warp::path!("api" / "reports" / String)
        .and(warp::get())
        .and(with_state(Arc::clone(&state)))
        .and_then(get_report);

    let delete_route = warp::path!("api" / "reports" / String)
        .and(warp::delete())
        .and(warp::header::optional::<String>(DELETE_KEY_HEADER))
        .and(with_state(state))
        .and_then(delete_report);

    create_route
        .or(list_route)
        .unify()
        .or(validate_route)
        .unify()
        .or(generate_route)
        .unify()
        .or(progress_route)
        .unify()
        .or(get_route)
        .unify()
        .or(delete_route)
        .unify()
        .boxed()
}

/// Whether `candidate` matches the configured deletion secret.
/// Without a configured secret nothing matches.
fn key_matches(state: &AppState, candidate: &str) -> bool {
    state
        .config
        .auth
        .delete_key
        .as_deref()
        .is_some_and(|key| bool::from(key.as_bytes().ct_eq(candidate.as_bytes())))
}

/// Store a report
///
/// POST /api/reports
pub async fn create_report(
    body: NewReport,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Rejection> {
    let report = state
        .store
        .create_report(body)
        .await
        .map_err(|e| ApiError::from(e).reject())?;
    Ok(success(&report))
}

/// All reports, newest first
///
/// GET /api/reports
pub async fn list_reports(state: Arc<AppState>) -> Result<warp::reply::Response, Rejection> {
    let reports = state
        .store
        .list_reports()
        .await
        .map_err(|e| ApiError::from(e).reject())?;
    Ok(success(&reports))
}

/// One report by share token
///
/// GET /api/reports/{token}
pub async fn get_report(
    token: String,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Rejection> {
    let report = state
        .store
        .report_by_token(&token)
        .await
        .map_err(|e| ApiError::from(e).reject())?;
    Ok(success(&report))
}

/// Delete a report; requires the deletion secret
///
/// DELETE /api/reports/{token}
pub async fn delete_report(
    token: String,
    key: Option<String>,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Rejection> {
    if state.config.auth.delete_key.is_none() {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "Report deletion is disabled").reject());
    }
    if !key.as_deref().is_some_and(|k| key_matches(&state, k)) {
        warn!(%token, "delete rejected: bad key");
        return Err(ApiError::unauthorized("Invalid delete key").reject());
    }

    let report = state
        .store
        .delete_report(&token)
        .await
        .map_err(|e| ApiError::from(e).reject())?;
    info!(%token, group = %report.group, "report deleted via api");
    Ok(warp::reply::json(&json!({ "success": true })).into_response())
}

/// Check a deletion secret
///
/// POST /api/reports/validate-key
pub fn validate_key(body: &ValidateKeyRequest, state: &AppState) -> warp::reply::Response {
    let valid = key_matches(state, &body.delete_key);
    let status = if valid {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    warp::reply::with_status(warp::reply::json(&json!({ "valid": valid })), status).into_response()
}

/// Generate a whole report, optionally storing it
///
/// POST /api/reports/generate
pub async fn generate_report(
    body: GenerateRequest,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Rejection> {
    if body.students_data.is_empty() {
        return Err(ApiError::bad_request("Invalid request data: no students").reject());
    }
    if body.students_data.iter().any(|s| !s.has_name()) {
        return Err(
            ApiError::bad_request("Invalid student data: Missing name or lastname").reject(),
        );
    }

    let report = state.factory.generate(&body.students_data).await;

    let saved = match body.group.as_deref().map(str::trim) {
        Some(group) if !group.is_empty() => {
            let submission = NewReport::from_generated(group, &report)
                .map_err(|e| ApiError::from(e).reject())?;
            let stored = state
                .store
                .create_report(submission)
                .await
                .map_err(|e| ApiError::from(e).reject())?;
            Some(stored)
        }
        _ => None,
    };

    Ok(success(&GenerateBody { report, saved }))
}

fn progress_event(progress: GenerationProgress) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&progress).unwrap_or_default();
    Ok(Event::default().event("progress").data(data))
}

/// Server-sent generation progress for every report being generated
///
/// GET /api/reports/progress
pub fn progress_events(state: &AppState) -> warp::reply::Response {
    let updates = stream::unfold(state.factory.subscribe(), |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(progress) => return Some((progress, rx)),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    warp::sse::reply(warp::sse::keep_alive().stream(updates.map(progress_event))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    use scorecard_core::{AppConfig, InMemoryReportStore};
    use scorecard_test_utils::ScriptedGenerator;

    fn state(delete_key: Option<&str>) -> AppState {
        let mut config = AppConfig::new();
        if let Some(key) = delete_key {
            config = config.with_delete_key(key);
        }
        AppState::new(
            config,
            Arc::new(ScriptedGenerator::new()),
            Arc::new(InMemoryReportStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn key_matches_only_the_exact_secret() {
        let state = state(Some("secret"));
        assert!(key_matches(&state, "secret"));
        assert!(!key_matches(&state, "secreT"));
        assert!(!key_matches(&state, "secret2"));
        assert!(!key_matches(&state, ""));
    }

    #[test]
    fn nothing_matches_without_a_configured_secret() {
        let state = state(None);
        assert!(!key_matches(&state, ""));
        assert!(!key_matches(&state, "secret"));
    }
}
