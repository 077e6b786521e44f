//! Deadlines and panics: every failure still answers with `{error, code}`.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app_with, get, post_json, test_config_with_timeout, Behaviour,
    MockBackend,
};
use heartmula_api::router::build_app_router;
use heartmula_api::state::{build_runpod_backend, AppState};
use serde_json::json;
use tokio::net::TcpListener;

fn valid_body() -> serde_json::Value {
    json!({"lyrics": "la la la", "tags": "pop"})
}

/// A provider that accepts connections and never writes a byte.
async fn start_silent_provider() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}")
}

/// Router wired exactly like the binary: real RunPod client, derived
/// provider timeout, one second request deadline.
async fn app_with_silent_provider() -> axum::Router {
    let mut config = test_config_with_timeout(1);
    config.runpod.base_url = start_silent_provider().await;
    let backend = build_runpod_backend(&config).unwrap();
    build_app_router(AppState::new(config, Arc::new(backend)))
}

// ---------------------------------------------------------------------------
// Hung provider
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hung_provider_on_submit_is_502() {
    let app = app_with_silent_provider().await;

    let response = post_json(app, "/api/generate", valid_body()).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Failed to submit generation job");
    assert_eq!(json["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn hung_provider_on_status_is_502() {
    let app = app_with_silent_provider().await;

    let response = get(app, "/api/status/job-1").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "Failed to get job status");
}

// ---------------------------------------------------------------------------
// Request deadline and panics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_deadline_answers_json_408() {
    let app = build_test_app_with(test_config_with_timeout(1), MockBackend::new(Behaviour::Hang));

    let response = get(app, "/api/status/job-1").await;

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Request timed out");
    assert_eq!(json["code"], "TIMEOUT");
}

#[tokio::test]
async fn handler_panic_answers_json_500() {
    let app = build_test_app_with(
        test_config_with_timeout(30),
        MockBackend::new(Behaviour::Panic),
    );

    let response = post_json(app, "/api/generate", valid_body()).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "An internal error occurred");
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert!(!json.to_string().contains("exploded"));
}
