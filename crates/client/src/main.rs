use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use heartmula_client::{ClientConfig, GatewayClient};
use heartmula_core::backend::JobBackend;
use heartmula_core::job::JobStatus;
use heartmula_poller::{GenerationSession, PollOutcome};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "heartmula_client=info,heartmula_poller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    let lyrics = tokio::fs::read_to_string(&config.lyrics_file)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(path = %config.lyrics_file.display(), error = %e, "Failed to read lyrics");
            std::process::exit(1);
        });

    let backend: Arc<dyn JobBackend> = Arc::new(GatewayClient::new(
        &config.gateway_url,
        config.origin.clone(),
    ));
    let mut session = GenerationSession::new(backend, config.poll.clone());

    let job_id = match session.begin(config.request(lyrics)).await {
        Ok(job_id) => job_id,
        Err(e) => {
            tracing::error!(error = %e, "Submission failed");
            std::process::exit(1);
        }
    };
    tracing::info!(job_id = %job_id, gateway = %config.gateway_url, "Job submitted");

    if let Some(rx) = session.subscribe() {
        tokio::spawn(log_status_changes(rx));
    }

    // `None` means interrupted before the job reached a terminal state.
    let finished = tokio::select! {
        outcome = session.finish() => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    let outcome = match finished {
        Some(Ok(outcome)) => outcome,
        Some(Err(e)) => {
            tracing::error!(error = %e, "Polling failed");
            std::process::exit(1);
        }
        None => {
            tracing::warn!(job_id = %job_id, "Interrupted, cancelling job");
            match session.cancel().await {
                Ok(body) => tracing::info!(response = %body, "Cancel relayed"),
                Err(e) => tracing::error!(error = %e, "Cancel failed"),
            }
            session.release();
            std::process::exit(130);
        }
    };

    match outcome {
        PollOutcome::Completed(job) => {
            let mut path = config.output_path.clone();
            if path.is_dir() {
                path.push(job.artifact.suggested_file_name(&job.job_id));
            }
            if let Err(e) = job.artifact.save_to(&path).await {
                tracing::error!(path = %path.display(), error = %e, "Failed to save audio");
                std::process::exit(1);
            }
            tracing::info!(
                path = %path.display(),
                bytes = job.artifact.len(),
                duration_ms = ?job.output.duration_ms,
                inference_time_sec = ?job.output.inference_time_sec,
                "Audio saved",
            );
        }
        PollOutcome::Failed(message) => {
            tracing::error!(job_id = %job_id, error = %message, "Generation failed");
            std::process::exit(1);
        }
        PollOutcome::GaveUp {
            consecutive_failures,
            last_error,
        } => {
            tracing::error!(
                job_id = %job_id,
                consecutive_failures,
                last_error = %last_error,
                "Gave up polling",
            );
            std::process::exit(1);
        }
        PollOutcome::Stopped => {
            tracing::warn!(job_id = %job_id, "Polling stopped before the job finished");
        }
    }
}

/// Log every observed status change until the poller shuts down.
async fn log_status_changes(mut rx: watch::Receiver<JobStatus>) {
    while rx.changed().await.is_ok() {
        let status = *rx.borrow_and_update();
        tracing::info!(status = %status, "Job status changed");
    }
}
