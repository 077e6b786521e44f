//! Job handles, the status state machine, and provider output payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Fallback message when the provider reports `FAILED` without detail.
pub const DEFAULT_JOB_FAILED_MESSAGE: &str = "Job failed";
/// Fallback message when a completed job's output is unsuccessful.
pub const DEFAULT_OUTPUT_FAILED_MESSAGE: &str = "Generation failed";
/// `JobOutput::status` value that marks a successful generation.
pub const OUTPUT_STATUS_SUCCESS: &str = "success";

pub const INVALID_JOB_ID: &str = "Invalid job id";
const MAX_JOB_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// Job handle
// ---------------------------------------------------------------------------

/// Opaque job identifier assigned by the provider on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Accept a caller-supplied id. Only ASCII alphanumerics, `-` and `_`
    /// are allowed, since the id is interpolated into provider URLs.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_JOB_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(CoreError::Validation(INVALID_JOB_ID.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a generation job.
///
/// `Submitting` exists only locally, before the provider has assigned a
/// handle. The other four are the provider's own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Submitting,
    InQueue,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitting => "SUBMITTING",
            Self::InQueue => "IN_QUEUE",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Map a provider-reported status string. `SUBMITTING` is never
    /// reported by the provider and is not accepted here.
    pub fn from_provider(raw: &str) -> Option<Self> {
        match raw {
            "IN_QUEUE" => Some(Self::InQueue),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Submitting => 0,
            Self::InQueue => 1,
            Self::InProgress => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    /// Whether moving from `self` to `next` respects the monotonic
    /// lifecycle. Staying in the same state is always allowed; nothing
    /// leaves a terminal state.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Output payload of a `COMPLETED` job as produced by the provider worker.
///
/// Its `status` is independent of [`JobStatus`]: a job can complete while
/// the generation itself failed (`status: "error"` with a `message`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    pub status: String,
    /// Base64-encoded MP3 bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_time_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobOutput {
    pub fn is_success(&self) -> bool {
        self.status == OUTPUT_STATUS_SUCCESS
    }

    /// The provider's failure message, or a generic fallback.
    pub fn failure_message(&self) -> String {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_OUTPUT_FAILED_MESSAGE)
            .to_string()
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Result of a successful submission: the new handle and the provider's
/// initial status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub job_id: JobHandle,
    pub status: JobStatus,
}

/// Normalized answer to a single status query.
///
/// `output` is only ever present when `status` is `COMPLETED` and `error`
/// only when it is `FAILED`; build through [`StatusReport::from_parts`] to
/// keep that true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub job_id: JobHandle,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JobOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn from_parts(
        job_id: JobHandle,
        status: JobStatus,
        output: Option<JobOutput>,
        error: Option<String>,
    ) -> Self {
        let output = output.filter(|_| status == JobStatus::Completed);
        let error = (status == JobStatus::Failed).then(|| {
            error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_JOB_FAILED_MESSAGE.to_string())
        });
        Self {
            job_id,
            status,
            output,
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
