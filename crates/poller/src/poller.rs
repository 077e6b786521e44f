//! Fixed-interval status poller for a single generation job.
//!
//! A [`JobPoller`] owns one spawned task that resolves the job's status
//! on every tick until the provider reports a terminal state or the
//! poller is stopped. At most one status call is outstanding at a time:
//! a tick that finds the previous call still running is skipped.
//!
//! Transient resolver failures are logged and polling continues on the
//! next tick. By default there is no cap; set
//! [`PollerConfig::max_consecutive_failures`] to give up after a run of
//! failures.

use std::sync::Arc;
use std::time::Duration;

use heartmula_core::backend::{JobBackend, ProviderError};
use heartmula_core::job::{JobHandle, JobOutput, JobStatus, StatusReport, DEFAULT_JOB_FAILED_MESSAGE};
use heartmula_core::materialize::{materialize, AudioArtifact, AUDIO_MPEG};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default time between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

pub const NO_OUTPUT_MESSAGE: &str = "Job completed without output";
pub const NO_AUDIO_MESSAGE: &str = "Job completed without audio";
pub const INVALID_AUDIO_MESSAGE: &str = "Invalid audio payload";

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Give up after this many consecutive resolver failures. `None`
    /// polls until the provider itself terminates the job.
    pub max_consecutive_failures: Option<u32>,
    /// Media type attached to the materialized result.
    pub media_type: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_failures: None,
            media_type: AUDIO_MPEG.to_string(),
        }
    }
}

/// A successfully generated and materialized result.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub job_id: JobHandle,
    pub artifact: Arc<AudioArtifact>,
    /// Provider output metadata; `audio_base64` is moved into `artifact`.
    pub output: JobOutput,
}

/// How a poller finished.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Completed(CompletedJob),
    /// The job failed, its output was unsuccessful, or the result could
    /// not be materialized. Carries a user-facing message.
    Failed(String),
    /// Stopped by the caller before a terminal state was observed.
    Stopped,
    GaveUp {
        consecutive_failures: u32,
        last_error: String,
    },
}

/// Handle to a running poller task.
///
/// Dropping the handle stops the poller.
pub struct JobPoller {
    job_id: JobHandle,
    cancel: CancellationToken,
    status_rx: watch::Receiver<JobStatus>,
    task: Option<JoinHandle<PollOutcome>>,
}

impl JobPoller {
    /// Spawn a poller for `job_id`, seeded with the status the
    /// submission returned. The first query fires one interval from now.
    pub fn start(
        backend: Arc<dyn JobBackend>,
        job_id: JobHandle,
        initial: JobStatus,
        config: PollerConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(initial);

        tracing::info!(
            job_id = %job_id,
            status = %initial,
            interval_ms = config.interval.as_millis() as u64,
            "Poller started",
        );

        let task = tokio::spawn(run(
            backend,
            job_id.clone(),
            config,
            cancel.clone(),
            status_tx,
        ));

        Self {
            job_id,
            cancel,
            status_rx,
            task: Some(task),
        }
    }

    pub fn job_id(&self) -> &JobHandle {
        &self.job_id
    }

    /// Most recently observed status.
    pub fn status(&self) -> JobStatus {
        *self.status_rx.borrow()
    }

    /// Receive every observed status change.
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status_rx.clone()
    }

    /// Cancel the timer. An in-flight status call is left to finish and
    /// its result is discarded.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the poller to reach an outcome.
    pub async fn wait(mut self) -> PollOutcome {
        let Some(task) = self.task.take() else {
            return PollOutcome::Stopped;
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(job_id = %self.job_id, error = %e, "Poller task aborted");
                PollOutcome::Failed("Status polling stopped unexpectedly".to_string())
            }
        }
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Resolve the outstanding status call, or never if there is none.
async fn join_in_flight<T>(
    slot: &mut Option<JoinHandle<T>>,
) -> Result<T, tokio::task::JoinError> {
    match slot.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn run(
    backend: Arc<dyn JobBackend>,
    job_id: JobHandle,
    config: PollerConfig,
    cancel: CancellationToken,
    status_tx: watch::Sender<JobStatus>,
) -> PollOutcome {
    let mut ticker = tokio::time::interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut in_flight: Option<JoinHandle<Result<StatusReport, ProviderError>>> = None;
    let mut consecutive_failures: u32 = 0;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                if in_flight.is_some() {
                    tracing::debug!(job_id = %job_id, "Detaching in-flight status call");
                }
                tracing::info!(job_id = %job_id, "Poller stopped");
                return PollOutcome::Stopped;
            }

            joined = join_in_flight(&mut in_flight) => {
                in_flight = None;
                let result = joined.unwrap_or_else(|e| {
                    Err(ProviderError::Transport(format!("status task failed: {e}")))
                });

                match result {
                    Ok(report) => {
                        consecutive_failures = 0;
                        if let Some(outcome) = apply_report(&job_id, report, &status_tx, &config) {
                            return outcome;
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        tracing::warn!(
                            job_id = %job_id,
                            error = %e,
                            consecutive_failures,
                            "Status poll failed, retrying on next tick",
                        );
                        if config
                            .max_consecutive_failures
                            .is_some_and(|max| consecutive_failures >= max)
                        {
                            tracing::error!(job_id = %job_id, consecutive_failures, "Poller giving up");
                            return PollOutcome::GaveUp {
                                consecutive_failures,
                                last_error: e.to_string(),
                            };
                        }
                    }
                }
            }

            _ = ticker.tick() => {
                if in_flight.is_some() {
                    tracing::debug!(job_id = %job_id, "Previous status call still in flight, skipping tick");
                    continue;
                }
                let backend = Arc::clone(&backend);
                let id = job_id.clone();
                in_flight = Some(tokio::spawn(async move { backend.status(&id).await }));
            }
        }
    }
}

/// Fold one status report into the observed state. Returns an outcome
/// once the job is terminal.
fn apply_report(
    job_id: &JobHandle,
    report: StatusReport,
    status_tx: &watch::Sender<JobStatus>,
    config: &PollerConfig,
) -> Option<PollOutcome> {
    let current = *status_tx.borrow();
    if !current.can_transition_to(report.status) {
        tracing::warn!(
            job_id = %job_id,
            from = %current,
            to = %report.status,
            "Ignoring out-of-order status",
        );
        return None;
    }

    if current != report.status {
        tracing::debug!(job_id = %job_id, from = %current, to = %report.status, "Job status changed");
        status_tx.send_replace(report.status);
    }

    match report.status {
        JobStatus::Completed => Some(complete(job_id, report.output, &config.media_type)),
        JobStatus::Failed => {
            let message = report
                .error
                .unwrap_or_else(|| DEFAULT_JOB_FAILED_MESSAGE.to_string());
            tracing::warn!(job_id = %job_id, error = %message, "Job failed");
            Some(PollOutcome::Failed(message))
        }
        _ => None,
    }
}

fn complete(job_id: &JobHandle, output: Option<JobOutput>, media_type: &str) -> PollOutcome {
    let Some(mut output) = output else {
        tracing::warn!(job_id = %job_id, "Completed job has no output");
        return PollOutcome::Failed(NO_OUTPUT_MESSAGE.to_string());
    };

    if !output.is_success() {
        let message = output.failure_message();
        tracing::warn!(job_id = %job_id, error = %message, "Job completed but generation failed");
        return PollOutcome::Failed(message);
    }

    let Some(encoded) = output.audio_base64.take() else {
        return PollOutcome::Failed(NO_AUDIO_MESSAGE.to_string());
    };

    match materialize(&encoded, media_type) {
        Ok(artifact) => {
            tracing::info!(
                job_id = %job_id,
                bytes = artifact.len(),
                inference_time_sec = ?output.inference_time_sec,
                "Result materialized",
            );
            PollOutcome::Completed(CompletedJob {
                job_id: job_id.clone(),
                artifact: Arc::new(artifact),
                output,
            })
        }
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Result materialization failed");
            PollOutcome::Failed(INVALID_AUDIO_MESSAGE.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use assert_matches::assert_matches;

    use super::*;
    use crate::testing::{error_output, success_output, ScriptedBackend, Step};

    fn start(backend: &Arc<ScriptedBackend>, config: PollerConfig) -> JobPoller {
        let backend: Arc<dyn JobBackend> = backend.clone();
        JobPoller::start(backend, JobHandle::new("job-1"), JobStatus::InQueue, config)
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_completed_and_materializes_once() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Step::Status(JobStatus::InQueue),
            Step::Status(JobStatus::InProgress),
            Step::Completed(success_output("AAAA")),
        ]));
        let started = Instant::now();

        let outcome = start(&backend, PollerConfig::default()).wait().await;

        let job = assert_matches!(outcome, PollOutcome::Completed(job) => job);
        assert_eq!(job.artifact.len(), 3);
        assert_eq!(job.artifact.media_type(), AUDIO_MPEG);
        assert!(job.output.audio_base64.is_none());
        assert_eq!(backend.status_calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(9));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.status_calls(), 3, "no polling after a terminal state");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_surfaces_provider_message() {
        let backend = Arc::new(ScriptedBackend::new(vec![Step::Failed(Some(
            "CUDA out of memory".into(),
        ))]));

        let outcome = start(&backend, PollerConfig::default()).wait().await;

        assert_matches!(outcome, PollOutcome::Failed(msg) if msg == "CUDA out of memory");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_without_message_uses_fallback() {
        let backend = Arc::new(ScriptedBackend::new(vec![Step::Failed(None)]));

        let outcome = start(&backend, PollerConfig::default()).wait().await;

        assert_matches!(outcome, PollOutcome::Failed(msg) if msg == DEFAULT_JOB_FAILED_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn unsuccessful_output_is_a_failure() {
        let backend = Arc::new(ScriptedBackend::new(vec![Step::Completed(error_output(Some(
            "Model load failed: disk full",
        )))]));

        let outcome = start(&backend, PollerConfig::default()).wait().await;

        assert_matches!(outcome, PollOutcome::Failed(msg) if msg == "Model load failed: disk full");
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_audio_is_a_failure() {
        let backend = Arc::new(ScriptedBackend::new(vec![Step::Completed(success_output(
            "not*base64",
        ))]));

        let outcome = start(&backend, PollerConfig::default()).wait().await;

        assert_matches!(outcome, PollOutcome::Failed(msg) if msg == INVALID_AUDIO_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_do_not_stop_polling() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Step::TransportError,
            Step::TransportError,
            Step::TransportError,
            Step::Completed(success_output("AAAA")),
        ]));

        let outcome = start(&backend, PollerConfig::default()).wait().await;

        assert_matches!(outcome, PollOutcome::Completed(_));
        assert_eq!(backend.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_configured_failures() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Step::TransportError,
            Step::TransportError,
        ]));
        let config = PollerConfig {
            max_consecutive_failures: Some(2),
            ..Default::default()
        };

        let outcome = start(&backend, config).wait().await;

        assert_matches!(
            outcome,
            PollOutcome::GaveUp { consecutive_failures: 2, .. }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_count() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Step::TransportError,
            Step::Status(JobStatus::InProgress),
            Step::TransportError,
            Step::Completed(success_output("AAAA")),
        ]));
        let config = PollerConfig {
            max_consecutive_failures: Some(2),
            ..Default::default()
        };

        let outcome = start(&backend, config).wait().await;

        assert_matches!(outcome, PollOutcome::Completed(_));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calls_never_overlap() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![
                Step::Status(JobStatus::InProgress),
                Step::Status(JobStatus::InProgress),
                Step::Completed(success_output("AAAA")),
            ])
            .with_delay(Duration::from_secs(7)),
        );

        let outcome = start(&backend, PollerConfig::default()).wait().await;

        assert_matches!(outcome, PollOutcome::Completed(_));
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(backend.status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_timer() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let poller = start(&backend, PollerConfig::default());

        tokio::time::sleep(Duration::from_secs(10)).await;
        poller.stop();
        let outcome = poller.wait().await;
        assert_matches!(outcome, PollOutcome::Stopped);

        tokio::time::sleep(Duration::from_millis(1)).await;
        let calls = backend.status_calls();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.status_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_result_is_discarded_after_stop() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![Step::Completed(success_output("AAAA"))])
                .with_delay(Duration::from_secs(5)),
        );
        let poller = start(&backend, PollerConfig::default());
        let status = poller.subscribe();

        // First call starts at t=3s and answers at t=8s.
        tokio::time::sleep(Duration::from_secs(4)).await;
        poller.stop();
        assert_matches!(poller.wait().await, PollOutcome::Stopped);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.status_calls(), 1);
        assert_eq!(*status.borrow(), JobStatus::InQueue);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_polling() {
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let poller = start(&backend, PollerConfig::default());

        tokio::time::sleep(Duration::from_secs(4)).await;
        drop(poller);
        tokio::time::sleep(Duration::from_millis(1)).await;
        let calls = backend.status_calls();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.status_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn status_updates_are_published() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Step::Status(JobStatus::InProgress),
        ]));
        let poller = start(&backend, PollerConfig::default());
        let mut status = poller.subscribe();

        status.changed().await.unwrap();
        assert_eq!(*status.borrow(), JobStatus::InProgress);
        assert_eq!(poller.status(), JobStatus::InProgress);
        poller.stop();
    }

    #[test]
    fn regression_is_ignored() {
        let (tx, rx) = watch::channel(JobStatus::InProgress);
        let report = StatusReport::from_parts(JobHandle::new("j"), JobStatus::InQueue, None, None);

        let outcome = apply_report(&JobHandle::new("j"), report, &tx, &PollerConfig::default());

        assert!(outcome.is_none());
        assert_eq!(*rx.borrow(), JobStatus::InProgress);
    }

    #[test]
    fn completed_without_output_fails() {
        let (tx, _rx) = watch::channel(JobStatus::InProgress);
        let report = StatusReport::from_parts(JobHandle::new("j"), JobStatus::Completed, None, None);

        let outcome = apply_report(&JobHandle::new("j"), report, &tx, &PollerConfig::default());

        assert_matches!(outcome, Some(PollOutcome::Failed(msg)) if msg == NO_OUTPUT_MESSAGE);
    }
}
