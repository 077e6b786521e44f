use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::middleware::rate_limit::rate_limit;
use crate::state::AppState;

/// Job routes, mounted under `/api`.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/generate",
            post(generation::generate)
                .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit)),
        )
        .route("/status/{job_id}", get(generation::job_status))
        .route("/cancel/{job_id}", post(generation::cancel_job))
}
