//! Scorecard Server - HTTP API for proficiency reports
//!
//! Exposes report storage, public sharing and advice generation over HTTP.
//! All generation requests funnel through one rate-limited queue whose
//! state is published at `/api/queue/status` and streamed at
//! `/api/queue/events`.
//!
//! ## Quick Start
//!
//! ```bash
//! # Defaults: 127.0.0.1:3000, 15 requests per minute
//! GEMINI_API_KEY=... SCORECARD_DELETE_KEY=... scorecard serve
//!
//! # With a config file and JSON logs
//! scorecard --config scorecard.toml --log-json serve --bind 0.0.0.0:8080
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

/// Error types
pub mod error;
/// HTTP routes
pub mod routes;
/// Shared application state
pub mod state;

pub use error::{ApiError, ServerError};
pub use routes::api;
pub use state::{AppState, QueueStatus};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Bind and serve until `shutdown` resolves
///
/// Returns the bound address and the server future.
pub fn bind(
    state: Arc<AppState>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>), ServerError> {
    let (bound, server) = warp::serve(api(state))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(addr = %bound, "scorecard api listening");
    Ok((bound, server))
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
