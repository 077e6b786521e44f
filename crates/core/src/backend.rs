//! The seam between lifecycle logic and whatever actually runs the job.
//!
//! Implemented by the provider client (direct to the compute provider) and
//! by the gateway client (through this system's own HTTP surface), so the
//! poller and session work against either.

use async_trait::async_trait;

use crate::job::{JobHandle, StatusReport, Submission};
use crate::request::GenerationRequest;

/// Errors reaching or interpreting a job backend.
///
/// None of these mean the job itself failed; a `FAILED` job is a
/// successful [`StatusReport`].
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The request never got a response (network, DNS, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-2xx status.
    #[error("Provider error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// The backend answered 2xx but the body could not be interpreted.
    #[error("Invalid provider response: {0}")]
    Decode(String),

    /// The backend reported a status outside the known vocabulary.
    #[error("Unrecognized job status '{0}'")]
    UnrecognizedStatus(String),
}

/// Submission, status and cancellation for generation jobs.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Forward a validated request; one outbound call, no retry.
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, ProviderError>;

    /// Resolve the current status of a job.
    async fn status(&self, job_id: &JobHandle) -> Result<StatusReport, ProviderError>;

    /// Ask the backend to cancel a job, returning its raw response.
    async fn cancel(&self, job_id: &JobHandle) -> Result<serde_json::Value, ProviderError>;
}
