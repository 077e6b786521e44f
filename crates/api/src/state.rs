use std::sync::Arc;

use heartmula_core::backend::JobBackend;
use heartmula_runpod::RunPodApi;

use crate::config::ServerConfig;
use crate::middleware::rate_limit::RateLimiter;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// Job provider that submissions, status queries and cancels go to.
    pub backend: Arc<dyn JobBackend>,
    /// Sliding-window limiter for the submission route.
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: ServerConfig, backend: Arc<dyn JobBackend>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        Self {
            config: Arc::new(config),
            backend,
            rate_limiter,
        }
    }
}

/// Build the RunPod client the server forwards to, with the per-call
/// provider timeout applied.
pub fn build_runpod_backend(config: &ServerConfig) -> Result<RunPodApi, reqwest::Error> {
    let http = reqwest::Client::builder()
        .timeout(config.provider_timeout)
        .build()?;
    Ok(RunPodApi::with_client(http, config.runpod.clone()))
}
