//! Origin allow-list guard.

use axum::extract::{Request, State};
use axum::http::header::ORIGIN;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::state::AppState;

pub const ORIGIN_NOT_ALLOWED: &str = "Origin not allowed";

/// Reject requests whose `Origin` header is not in
/// [`ServerConfig::allowed_origins`](crate::config::ServerConfig::allowed_origins).
///
/// Requests without an `Origin` header pass only when
/// `allow_missing_origin` is set.
pub async fn origin_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let allowed = match request.headers().get(ORIGIN) {
        None => state.config.allow_missing_origin,
        Some(value) => value
            .to_str()
            .map(|origin| is_allowed(&state.config.allowed_origins, origin))
            .unwrap_or(false),
    };

    if !allowed {
        tracing::warn!(
            origin = ?request.headers().get(ORIGIN),
            path = %request.uri().path(),
            "Rejected request from disallowed origin",
        );
        return Err(AppError::Forbidden(ORIGIN_NOT_ALLOWED.to_string()));
    }

    Ok(next.run(request).await)
}

/// Exact match, ignoring a trailing slash on either side.
pub fn is_allowed(allowed: &[String], origin: &str) -> bool {
    let origin = origin.trim_end_matches('/');
    allowed.iter().any(|a| a.trim_end_matches('/') == origin)
}
