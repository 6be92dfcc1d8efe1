//! Error types for the Scorecard API
//!
//! Every error leaves the server as `{ "success": false, "error": ..., "details"?: ... }`.

use scorecard_core::{ConfigError, GenerationError, StoreError};
use serde::Serialize;
use std::convert::Infallible;
use tracing::error;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::{Rejection, Reply};

/// Startup errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration failed to load or validate
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Provider client could not be built
    #[error("failed to build generation client: {0}")]
    Generation(#[from] GenerationError),

    /// Listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: std::net::SocketAddr,
        /// Underlying bind failure
        #[source]
        source: warp::Error,
    },
}

/// Request-level error carried through warp rejections
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Short message shown as `error`
    pub message: String,
    /// Extra context shown as `details`
    pub details: Option<String>,
}

impl Reject for ApiError {}

impl ApiError {
    /// Error with a status and message
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Attach details
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Bad request
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Not found
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Unauthorized
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// Server-side failure; details are logged, not returned
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").with_details(details)
    }

    /// Convert into a warp rejection
    #[must_use]
    pub fn reject(self) -> Rejection {
        warp::reject::custom(self)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound { kind: "student", .. } => Self::not_found("Student report not found"),
            StoreError::NotFound { .. } => Self::not_found("Report not found"),
            StoreError::Invalid(reason) => {
                Self::bad_request(format!("Invalid request data: {reason}"))
            }
            StoreError::Backend(_) => Self::internal(err.to_string()),
        }
    }
}

/// Error body
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

fn error_reply(status: StatusCode, message: &str, details: Option<&str>) -> warp::reply::Response {
    let body = ErrorBody {
        success: false,
        error: message,
        details,
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

/// Turn rejections into JSON error bodies
pub async fn handle_rejection(rejection: Rejection) -> Result<warp::reply::Response, Infallible> {
    if let Some(err) = rejection.find::<ApiError>() {
        if err.status.is_server_error() {
            error!(status = %err.status, details = ?err.details, "request failed");
        }
        return Ok(error_reply(err.status, &err.message, err.details.as_deref()));
    }

    if rejection.is_not_found() {
        return Ok(error_reply(StatusCode::NOT_FOUND, "Not found", None));
    }

    if let Some(err) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        let details = err.to_string();
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            "Invalid JSON in request body",
            Some(&details),
        ));
    }

    if let Some(err) = rejection.find::<warp::reject::InvalidQuery>() {
        let details = err.to_string();
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            "Invalid query string",
            Some(&details),
        ));
    }

    if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(error_reply(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large", None));
    }

    if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        return Ok(error_reply(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected a JSON request body",
            None,
        ));
    }

    if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None));
    }

    error!(?rejection, "unhandled rejection");
    Ok(error_reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        None,
    ))
}
