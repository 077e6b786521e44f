//! Handlers for job submission, status resolution and cancellation.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use heartmula_core::job::{JobHandle, StatusReport, Submission};
use heartmula_core::request::GenerationRequest;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const SUBMIT_FAILED: &str = "Failed to submit generation job";
pub const STATUS_FAILED: &str = "Failed to get job status";
pub const CANCEL_FAILED: &str = "Failed to cancel job";

/// POST /api/generate
///
/// Validates the request locally, then forwards it to the provider once.
/// Validation failures never reach the provider.
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<Submission>> {
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let request = GenerationRequest::from_json(&payload)?;

    let submission = state
        .backend
        .submit(&request)
        .await
        .map_err(|e| AppError::upstream(SUBMIT_FAILED, e))?;

    Ok(Json(submission))
}

/// GET /api/status/{job_id}
///
/// A provider failure here is a 502, distinct from a job whose status is
/// `FAILED` (a 200 with `error`).
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<StatusReport>> {
    let job_id = JobHandle::parse(&job_id)?;

    let report = state
        .backend
        .status(&job_id)
        .await
        .map_err(|e| AppError::upstream(STATUS_FAILED, e))?;

    Ok(Json(report))
}

/// POST /api/cancel/{job_id}
///
/// Relays the provider's response body verbatim.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<Value>> {
    let job_id = JobHandle::parse(&job_id)?;

    let body = state
        .backend
        .cancel(&job_id)
        .await
        .map_err(|e| AppError::upstream(CANCEL_FAILED, e))?;

    Ok(Json(body))
}
