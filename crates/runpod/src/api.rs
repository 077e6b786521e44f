//! REST API client for a RunPod serverless endpoint.
//!
//! Wraps the endpoint's job API (submission, status, cancellation) using
//! [`reqwest`]. Every call is a single request; nothing is retried here.

use async_trait::async_trait;
use heartmula_core::backend::{JobBackend, ProviderError};
use heartmula_core::job::{JobHandle, StatusReport, Submission};
use heartmula_core::request::GenerationRequest;
use serde::Serialize;

use crate::resolver::{normalize_status, normalize_submission, RawRunResponse, RawStatusResponse};

/// Public RunPod serverless API root.
pub const DEFAULT_BASE_URL: &str = "https://api.runpod.ai/v2";

/// Connection settings for one serverless endpoint.
#[derive(Debug, Clone)]
pub struct RunPodConfig {
    /// API root, e.g. `https://api.runpod.ai/v2`.
    pub base_url: String,
    pub endpoint_id: String,
    pub api_key: String,
}

/// HTTP client for a single RunPod endpoint.
pub struct RunPodApi {
    client: reqwest::Client,
    endpoint_url: String,
    api_key: String,
}

/// Errors from the RunPod REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum RunPodApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// RunPod returned a non-2xx status code.
    #[error("RunPod API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl From<RunPodApiError> for ProviderError {
    fn from(err: RunPodApiError) -> Self {
        match err {
            RunPodApiError::ApiError { status, body } => ProviderError::Upstream { status, body },
            RunPodApiError::Request(e) if e.is_decode() => ProviderError::Decode(e.to_string()),
            RunPodApiError::Request(e) => ProviderError::Transport(e.to_string()),
        }
    }
}

/// Request envelope for `POST /run`.
#[derive(Serialize)]
struct RunEnvelope<'a> {
    input: &'a GenerationRequest,
}

impl RunPodApi {
    /// Create a new API client for a RunPod endpoint.
    pub fn new(config: RunPodConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for sharing timeouts and connection pools).
    pub fn with_client(client: reqwest::Client, config: RunPodConfig) -> Self {
        let endpoint_url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.endpoint_id
        );
        Self {
            client,
            endpoint_url,
            api_key: config.api_key,
        }
    }

    /// Submit a generation job.
    ///
    /// Sends `POST /run` with `{"input": request}`. Returns the raw run
    /// response containing the provider-assigned job id.
    pub async fn run(&self, request: &GenerationRequest) -> Result<RawRunResponse, RunPodApiError> {
        let response = self
            .client
            .post(format!("{}/run", self.endpoint_url))
            .bearer_auth(&self.api_key)
            .json(&RunEnvelope { input: request })
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Query the status of a job via `GET /status/{job_id}`.
    pub async fn job_status(&self, job_id: &str) -> Result<RawStatusResponse, RunPodApiError> {
        let response = self
            .client
            .get(format!("{}/status/{}", self.endpoint_url, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Cancel a queued or running job via `POST /cancel/{job_id}`.
    ///
    /// Returns RunPod's response body untouched.
    pub async fn cancel_job(&self, job_id: &str) -> Result<serde_json::Value, RunPodApiError> {
        let response = self
            .client
            .post(format!("{}/cancel/{}", self.endpoint_url, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`RunPodApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, RunPodApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RunPodApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RunPodApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl JobBackend for RunPodApi {
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, ProviderError> {
        let raw = self.run(request).await?;
        let submission = normalize_submission(raw)?;

        tracing::info!(
            job_id = %submission.job_id,
            status = %submission.status,
            lyrics_chars = request.lyrics.chars().count(),
            tags = %request.tags,
            duration_ms = request.duration_ms,
            "Job submitted to RunPod",
        );

        Ok(submission)
    }

    async fn status(&self, job_id: &JobHandle) -> Result<StatusReport, ProviderError> {
        let raw = self.job_status(job_id.as_str()).await?;

        tracing::debug!(
            job_id = %job_id,
            status = ?raw.status,
            delay_ms = ?raw.delay_time,
            execution_ms = ?raw.execution_time,
            "RunPod status received",
        );

        normalize_status(job_id, raw)
    }

    async fn cancel(&self, job_id: &JobHandle) -> Result<serde_json::Value, ProviderError> {
        let body = self.cancel_job(job_id.as_str()).await?;
        tracing::info!(job_id = %job_id, "Cancel relayed to RunPod");
        Ok(body)
    }
}
