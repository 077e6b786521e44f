use axum::http::header::RETRY_AFTER;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use heartmula_core::backend::ProviderError;
use heartmula_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers and middleware.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent `{error, code}` JSON
/// bodies. Provider details are logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `heartmula_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The provider could not be reached or answered with a failure.
    /// `message` is the generic text shown to the caller.
    #[error("{message}: {source}")]
    Upstream {
        message: &'static str,
        source: ProviderError,
    },

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The caller's origin is not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The caller exceeded the submission rate limit.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The request did not finish within the configured deadline.
    #[error("Request timed out")]
    Timeout,

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn upstream(message: &'static str, source: ProviderError) -> Self {
        Self::Upstream { message, source }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Materialization(msg) | CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Provider errors ---
            AppError::Upstream { message, source } => {
                log_provider_error(message, source);
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    (*message).to_string(),
                )
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "Too many requests, please try again later".to_string(),
            ),
            AppError::Timeout => (
                StatusCode::REQUEST_TIMEOUT,
                "TIMEOUT",
                "Request timed out".to_string(),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        let mut response = (status, axum::Json(body)).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, retry_after_secs.into());
        }
        response
    }
}

/// Log the diagnostic detail of a provider failure server-side.
fn log_provider_error(context: &str, err: &ProviderError) {
    match err {
        ProviderError::Upstream { status, body } => {
            tracing::error!(status, body = %body, context, "Provider returned an error");
        }
        ProviderError::Transport(detail) => {
            tracing::error!(error = %detail, context, "Provider unreachable");
        }
        other => {
            tracing::error!(error = %other, context, "Unusable provider response");
        }
    }
}
