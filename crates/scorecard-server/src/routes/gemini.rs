//! Single advice requests
//!
//! These endpoints always answer 200. When generation fails the body
//! carries default content, `"source": "fallback"` and a notice.

use super::{json_body, with_state};
use crate::state::AppState;
use scorecard_core::{Advice, ChartData, StudentScores};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::filters::BoxedFilter;
use warp::{Filter, Reply};

/// Body of the per-student endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRequest {
    /// Student data
    pub student_data: StudentScores,
}

/// Body of the group endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRequest {
    /// Distribution data
    #[serde(default)]
    pub distribution_data: Vec<ChartData>,
}

#[derive(Debug, Serialize)]
struct AdviceBody<T> {
    success: bool,
    data: T,
    source: scorecard_core::AdviceSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<String>,
}

fn advice_reply<T: Serialize>(advice: Advice<T>) -> warp::reply::Response {
    let body = AdviceBody {
        success: true,
        data: advice.content,
        source: advice.source,
        notice: advice.notice,
    };
    warp::reply::json(&body).into_response()
}

/// Advice generation endpoints
pub fn routes(state: Arc<AppState>) -> BoxedFilter<(warp::reply::Response,)> {
    let individual_route = warp::path!("api" / "gemini" / "individual-recommendations")
        .and(warp::post())
        .and(json_body::<StudentRequest>())
        .and(with_state(Arc::clone(&state)))
        .and_then(individual_recommendations);

    let resources_route = warp::path!("api" / "gemini" / "resources")
        .and(warp::post())
        .and(json_body::<StudentRequest>())
        .and(with_state(Arc::clone(&state)))
        .and_then(resources);

    let general_route = warp::path!("api" / "gemini" / "general-recommendations")
        .and(warp::post())
        .and(json_body::<DistributionRequest>())
        .and(with_state(Arc::clone(&state)))
        .and_then(general_recommendations);

    let analysis_route = warp::path!("api" / "gemini" / "skill-analysis")
        .and(warp::post())
        .and(json_body::<DistributionRequest>())
        .and(with_state(state))
        .and_then(skill_analysis);

    individual_route
        .or(resources_route)
        .unify()
        .or(general_route)
        .unify()
        .or(analysis_route)
        .unify()
        .boxed()
}

/// POST /api/gemini/individual-recommendations
pub async fn individual_recommendations(
    body: StudentRequest,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Infallible> {
    let advice = state
        .advisor
        .individual_recommendations_or_default(&body.student_data)
        .await;
    Ok(advice_reply(advice))
}

/// POST /api/gemini/resources
pub async fn resources(
    body: StudentRequest,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Infallible> {
    let advice = state.advisor.resources_or_default(&body.student_data).await;
    Ok(advice_reply(advice))
}

/// POST /api/gemini/general-recommendations
pub async fn general_recommendations(
    body: DistributionRequest,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Infallible> {
    let advice = state
        .advisor
        .general_recommendations_or_default(&body.distribution_data)
        .await;
    Ok(advice_reply(advice))
}

/// POST /api/gemini/skill-analysis
pub async fn skill_analysis(
    body: DistributionRequest,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Infallible> {
    let advice = state
        .advisor
        .skill_analysis_or_default(&body.distribution_data)
        .await;
    Ok(advice_reply(advice))
}
