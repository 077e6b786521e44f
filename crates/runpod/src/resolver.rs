//! Normalization of raw RunPod payloads into the job status vocabulary.
//!
//! RunPod's own states are adopted directly. The two extra terminal states
//! RunPod can report (`CANCELLED`, `TIMED_OUT`) fold into `FAILED` so that
//! every provider-side termination stops a poller.

use heartmula_core::backend::ProviderError;
use heartmula_core::job::{JobHandle, JobOutput, JobStatus, StatusReport, Submission};
use serde::Deserialize;
use serde_json::Value;

pub const CANCELLED_MESSAGE: &str = "Job was cancelled";
pub const TIMED_OUT_MESSAGE: &str = "Job timed out";
/// Used when a completed job's output is not the expected object.
pub const MALFORMED_OUTPUT_MESSAGE: &str = "Malformed job output";

/// Body of `POST /run`.
#[derive(Debug, Deserialize)]
pub struct RawRunResponse {
    pub id: Option<String>,
    pub status: Option<String>,
}

/// Body of `GET /status/{id}`.
#[derive(Debug, Deserialize)]
pub struct RawStatusResponse {
    pub id: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    /// Milliseconds spent queued (informational).
    #[serde(default, rename = "delayTime")]
    pub delay_time: Option<u64>,
    /// Milliseconds spent executing (informational).
    #[serde(default, rename = "executionTime")]
    pub execution_time: Option<u64>,
}

/// Turn a `/run` response into a [`Submission`].
pub fn normalize_submission(raw: RawRunResponse) -> Result<Submission, ProviderError> {
    let id = raw
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::Decode("run response has no job id".into()))?;

    let status = match raw.status.as_deref() {
        // RunPod always queues on /run; treat a missing status as queued.
        None => JobStatus::InQueue,
        Some(s) => JobStatus::from_provider(s)
            .ok_or_else(|| ProviderError::UnrecognizedStatus(s.to_string()))?,
    };

    Ok(Submission {
        job_id: JobHandle::new(id),
        status,
    })
}

/// Turn a `/status/{id}` response into a [`StatusReport`] for `job_id`.
///
/// The requested handle is authoritative; the echoed `id` is ignored.
pub fn normalize_status(
    job_id: &JobHandle,
    raw: RawStatusResponse,
) -> Result<StatusReport, ProviderError> {
    let raw_status = raw
        .status
        .ok_or_else(|| ProviderError::Decode("status response has no status".into()))?;
    let error = raw.error.and_then(error_text);

    let (status, error) = match raw_status.as_str() {
        "CANCELLED" => (
            JobStatus::Failed,
            Some(error.unwrap_or_else(|| CANCELLED_MESSAGE.to_string())),
        ),
        "TIMED_OUT" => (
            JobStatus::Failed,
            Some(error.unwrap_or_else(|| TIMED_OUT_MESSAGE.to_string())),
        ),
        other => match JobStatus::from_provider(other) {
            Some(status) => (status, error),
            None => return Err(ProviderError::UnrecognizedStatus(other.to_string())),
        },
    };

    let output = if status == JobStatus::Completed {
        raw.output.map(|value| parse_output(job_id, value))
    } else {
        None
    };

    Ok(StatusReport::from_parts(
        job_id.clone(),
        status,
        output,
        error,
    ))
}

fn parse_output(job_id: &JobHandle, value: Value) -> JobOutput {
    serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!(job_id = %job_id, error = %e, "Completed job has malformed output");
        JobOutput {
            status: "error".into(),
            audio_base64: None,
            duration_ms: None,
            inference_time_sec: None,
            file_size_mb: None,
            message: Some(MALFORMED_OUTPUT_MESSAGE.into()),
        }
    })
}

/// RunPod reports errors as a string, or occasionally as a JSON object.
fn error_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
