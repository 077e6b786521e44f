//! Whole-request deadline.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::state::AppState;

/// Answer 408 with the usual JSON error body once
/// [`ServerConfig::request_timeout_secs`](crate::config::ServerConfig::request_timeout_secs)
/// has elapsed. The handler future is dropped.
pub async fn request_timeout(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let limit = Duration::from_secs(state.config.request_timeout_secs);
    let path = request.uri().path().to_owned();

    tokio::time::timeout(limit, next.run(request))
        .await
        .map_err(|_| {
            tracing::warn!(path = %path, timeout_secs = limit.as_secs(), "Request timed out");
            AppError::Timeout
        })
}
