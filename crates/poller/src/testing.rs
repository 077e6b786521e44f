//! Scripted in-memory backend shared by the poller and session tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use heartmula_core::backend::{JobBackend, ProviderError};
use heartmula_core::job::{JobHandle, JobOutput, JobStatus, StatusReport, Submission};
use heartmula_core::request::GenerationRequest;

pub(crate) enum Step {
    Status(JobStatus),
    Completed(JobOutput),
    Failed(Option<String>),
    TransportError,
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    delay: Duration,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            ..Default::default()
        }
    }

    /// Every status call takes `delay` (virtual time) to answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn success_output(audio_base64: &str) -> JobOutput {
    JobOutput {
        status: "success".into(),
        audio_base64: Some(audio_base64.into()),
        duration_ms: Some(120_000),
        inference_time_sec: Some(45.2),
        file_size_mb: Some(1.9),
        message: None,
    }
}

pub(crate) fn error_output(message: Option<&str>) -> JobOutput {
    JobOutput {
        status: "error".into(),
        audio_base64: None,
        duration_ms: None,
        inference_time_sec: None,
        file_size_mb: None,
        message: message.map(str::to_string),
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    async fn submit(&self, _request: &GenerationRequest) -> Result<Submission, ProviderError> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Submission {
            job_id: JobHandle::new(format!("job-{n}")),
            status: JobStatus::InQueue,
        })
    }

    async fn status(&self, job_id: &JobHandle) -> Result<StatusReport, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let step = self.steps.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let id = job_id.clone();
        match step.unwrap_or(Step::Status(JobStatus::InProgress)) {
            Step::Status(status) => Ok(StatusReport::from_parts(id, status, None, None)),
            Step::Completed(output) => Ok(StatusReport::from_parts(
                id,
                JobStatus::Completed,
                Some(output),
                None,
            )),
            Step::Failed(error) => Ok(StatusReport::from_parts(id, JobStatus::Failed, None, error)),
            Step::TransportError => Err(ProviderError::Transport("connection reset".into())),
        }
    }

    async fn cancel(&self, job_id: &JobHandle) -> Result<serde_json::Value, ProviderError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({"id": job_id.as_str(), "status": "CANCELLED"}))
    }
}
