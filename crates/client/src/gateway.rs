//! HTTP client for the gateway's `/api` job routes.

use async_trait::async_trait;
use heartmula_core::backend::{JobBackend, ProviderError};
use heartmula_core::job::{JobHandle, StatusReport, Submission};
use heartmula_core::request::GenerationRequest;
use reqwest::header::ORIGIN;
use serde::Deserialize;

/// Error body the gateway returns on every non-2xx response.
#[derive(Deserialize)]
struct GatewayErrorBody {
    error: String,
}

pub struct GatewayClient {
    client: reqwest::Client,
    api_url: String,
    origin: Option<String>,
}

impl GatewayClient {
    pub fn new(gateway_url: &str, origin: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), gateway_url, origin)
    }

    pub fn with_client(client: reqwest::Client, gateway_url: &str, origin: Option<String>) -> Self {
        Self {
            client,
            api_url: format!("{}/api", gateway_url.trim_end_matches('/')),
            origin,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.api_url, path));
        match &self.origin {
            Some(origin) => builder.header(ORIGIN, origin),
            None => builder,
        }
    }

    // ---- private helpers ----

    async fn send<T: serde::de::DeserializeOwned>(
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = builder.send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let raw = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            // Surface the gateway's own message when it sent one.
            let body = serde_json::from_str::<GatewayErrorBody>(&raw)
                .map(|b| b.error)
                .unwrap_or(raw);
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(transport)
    }
}

fn transport(err: reqwest::Error) -> ProviderError {
    if err.is_decode() {
        ProviderError::Decode(err.to_string())
    } else {
        ProviderError::Transport(err.to_string())
    }
}

#[async_trait]
impl JobBackend for GatewayClient {
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, ProviderError> {
        Self::send(self.request(reqwest::Method::POST, "/generate").json(request)).await
    }

    async fn status(&self, job_id: &JobHandle) -> Result<StatusReport, ProviderError> {
        let path = format!("/status/{job_id}");
        Self::send(self.request(reqwest::Method::GET, &path)).await
    }

    async fn cancel(&self, job_id: &JobHandle) -> Result<serde_json::Value, ProviderError> {
        let path = format!("/cancel/{job_id}");
        Self::send(self.request(reqwest::Method::POST, &path)).await
    }
}
