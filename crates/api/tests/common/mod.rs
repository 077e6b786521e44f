#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use heartmula_api::config::{default_provider_timeout, RateLimitConfig, ServerConfig};
use heartmula_api::router::build_app_router;
use heartmula_api::state::AppState;
use heartmula_core::backend::{JobBackend, ProviderError};
use heartmula_core::job::{JobHandle, JobStatus, StatusReport, Submission};
use heartmula_core::request::GenerationRequest;
use heartmula_runpod::RunPodConfig;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const ALLOWED_ORIGIN: &str = "http://localhost:5173";
pub const TEST_ENDPOINT: &str = "ep-test";

/// Build a test `ServerConfig` with safe defaults.
///
/// One allowed origin, missing origins allowed, and a generous rate limit
/// so only the rate-limit tests ever hit it.
pub fn test_config() -> ServerConfig {
    test_config_with_timeout(30)
}

/// Like [`test_config`] with a custom request timeout; the provider
/// timeout is derived the same way as in production.
pub fn test_config_with_timeout(request_timeout_secs: u64) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        allowed_origins: vec![ALLOWED_ORIGIN.to_string()],
        allow_missing_origin: true,
        request_timeout_secs,
        provider_timeout: default_provider_timeout(Duration::from_secs(request_timeout_secs)),
        rate_limit: RateLimitConfig {
            max_requests: 100,
            window_secs: 60,
        },
        trust_forwarded_for: false,
        runpod: RunPodConfig {
            base_url: "http://provider.invalid".to_string(),
            endpoint_id: TEST_ENDPOINT.to_string(),
            api_key: "test-key".to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Mock provider
// ---------------------------------------------------------------------------

/// How the mock answers every call.
pub enum Behaviour {
    Ok,
    Upstream { status: u16, body: &'static str },
    Unreachable,
    /// Never answers.
    Hang,
    /// Panics inside the call.
    Panic,
}

/// In-memory backend that records every outbound call.
pub struct MockBackend {
    behaviour: Behaviour,
    report: Mutex<Option<StatusReport>>,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub last_request: Mutex<Option<GenerationRequest>>,
}

impl MockBackend {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            report: Mutex::new(None),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::new(Behaviour::Ok)
    }

    /// Status report returned for the next status queries.
    pub fn set_report(&self, report: StatusReport) {
        *self.report.lock().unwrap() = Some(report);
    }

    pub fn outbound_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
            + self.status_calls.load(Ordering::SeqCst)
            + self.cancel_calls.load(Ordering::SeqCst)
    }

    async fn fail(&self) -> Option<ProviderError> {
        match self.behaviour {
            Behaviour::Ok => None,
            Behaviour::Hang => std::future::pending().await,
            Behaviour::Panic => panic!("mock backend exploded"),
            Behaviour::Upstream { status, body } => Some(ProviderError::Upstream {
                status,
                body: body.to_string(),
            }),
            Behaviour::Unreachable => Some(ProviderError::Transport("connection refused".into())),
        }
    }
}

#[async_trait]
impl JobBackend for MockBackend {
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, ProviderError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if let Some(err) = self.fail().await {
            return Err(err);
        }
        Ok(Submission {
            job_id: JobHandle::new("job-123"),
            status: JobStatus::InQueue,
        })
    }

    async fn status(&self, job_id: &JobHandle) -> Result<StatusReport, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail().await {
            return Err(err);
        }
        Ok(self.report.lock().unwrap().clone().unwrap_or_else(|| {
            StatusReport::from_parts(job_id.clone(), JobStatus::InProgress, None, None)
        }))
    }

    async fn cancel(&self, job_id: &JobHandle) -> Result<Value, ProviderError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail().await {
            return Err(err);
        }
        Ok(json!({"id": job_id.as_str(), "status": "CANCELLED"}))
    }
}

// ---------------------------------------------------------------------------
// App and request helpers
// ---------------------------------------------------------------------------

/// Build the full application router (same middleware stack as
/// production) around the given mock backend.
pub fn build_test_app(backend: Arc<MockBackend>) -> Router {
    build_test_app_with(test_config(), backend)
}

pub fn build_test_app_with(config: ServerConfig, backend: Arc<MockBackend>) -> Router {
    build_app_router(AppState::new(config, backend))
}

/// Request builder pre-populated with an allowed `Origin` and a peer
/// address, as `into_make_service_with_connect_info` would provide.
pub fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("origin", ALLOWED_ORIGIN)
        .extension(ConnectInfo(peer("10.0.0.1")))
}

pub fn peer(ip: &str) -> SocketAddr {
    SocketAddr::new(ip.parse().unwrap(), 40000)
}

pub fn json_body(builder: axum::http::request::Builder, body: &Value) -> Request<Body> {
    builder
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, request(Method::GET, uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, json_body(request(Method::POST, uri), &body)).await
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
