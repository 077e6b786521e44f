//! Session-scoped ownership of the current generation job.
//!
//! A [`GenerationSession`] holds at most one active poller and at most one
//! materialized result. Starting a new generation releases both before the
//! new submission goes out, so a stale result can never be confused with
//! the new job's.

use std::sync::Arc;

use heartmula_core::backend::{JobBackend, ProviderError};
use heartmula_core::error::CoreError;
use heartmula_core::job::{JobHandle, JobStatus};
use heartmula_core::materialize::AudioArtifact;
use heartmula_core::request::GenerationRequest;
use tokio::sync::watch;

use crate::poller::{JobPoller, PollOutcome, PollerConfig};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("No generation job is active")]
    NoActiveJob,
}

pub struct GenerationSession {
    backend: Arc<dyn JobBackend>,
    config: PollerConfig,
    /// Kept after the poller finishes, for display and cancel.
    job_id: Option<JobHandle>,
    poller: Option<JobPoller>,
    artifact: Option<Arc<AudioArtifact>>,
    last_status: Option<JobStatus>,
}

impl GenerationSession {
    pub fn new(backend: Arc<dyn JobBackend>, config: PollerConfig) -> Self {
        Self {
            backend,
            config,
            job_id: None,
            poller: None,
            artifact: None,
            last_status: None,
        }
    }

    /// Submit `request` and start polling it.
    ///
    /// Any previous job is released first: its poller is stopped and its
    /// result dropped, even if the new submission then fails.
    pub async fn begin(&mut self, request: GenerationRequest) -> Result<JobHandle, SessionError> {
        self.release();
        self.last_status = Some(JobStatus::Submitting);

        let request = request.normalized();
        if let Err(e) = request.validate() {
            self.last_status = None;
            return Err(e.into());
        }

        let submission = match self.backend.submit(&request).await {
            Ok(submission) => submission,
            Err(e) => {
                self.last_status = Some(JobStatus::Failed);
                return Err(e.into());
            }
        };

        let poller = JobPoller::start(
            Arc::clone(&self.backend),
            submission.job_id.clone(),
            submission.status,
            self.config.clone(),
        );

        self.job_id = Some(submission.job_id.clone());
        self.last_status = Some(submission.status);
        self.poller = Some(poller);
        Ok(submission.job_id)
    }

    pub fn job_id(&self) -> Option<&JobHandle> {
        self.job_id.as_ref()
    }

    /// Displayed status: live while polling, last known otherwise.
    pub fn status(&self) -> Option<JobStatus> {
        match &self.poller {
            Some(poller) => Some(poller.status()),
            None => self.last_status,
        }
    }

    /// Status change feed for the active poller.
    pub fn subscribe(&self) -> Option<watch::Receiver<JobStatus>> {
        self.poller.as_ref().map(JobPoller::subscribe)
    }

    /// The current job's result, once materialized.
    pub fn artifact(&self) -> Option<Arc<AudioArtifact>> {
        self.artifact.clone()
    }

    /// Wait for the active poller to finish and record its result.
    pub async fn finish(&mut self) -> Result<PollOutcome, SessionError> {
        let poller = self.poller.take().ok_or(SessionError::NoActiveJob)?;
        // Still readable after the poller task has dropped its sender.
        let observed = poller.subscribe();
        let outcome = poller.wait().await;

        match &outcome {
            PollOutcome::Completed(job) => {
                self.artifact = Some(Arc::clone(&job.artifact));
                self.last_status = Some(JobStatus::Completed);
            }
            PollOutcome::Failed(_) => self.last_status = Some(JobStatus::Failed),
            PollOutcome::Stopped | PollOutcome::GaveUp { .. } => {
                self.last_status = Some(*observed.borrow());
            }
        }
        Ok(outcome)
    }

    /// Relay a cancel for the current job. Local state is untouched; the
    /// poller notices on its next status resolution.
    pub async fn cancel(&self) -> Result<serde_json::Value, SessionError> {
        let job_id = self.job_id.as_ref().ok_or(SessionError::NoActiveJob)?;
        tracing::info!(job_id = %job_id, "Cancelling job");
        Ok(self.backend.cancel(job_id).await?)
    }

    /// Stop polling and drop the current job and its result.
    pub fn release(&mut self) {
        if let Some(poller) = self.poller.take() {
            tracing::debug!(job_id = %poller.job_id(), "Releasing active poller");
            poller.stop();
        }
        self.artifact = None;
        self.job_id = None;
        self.last_status = None;
    }
}
