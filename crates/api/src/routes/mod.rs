pub mod generation;
pub mod health;

use axum::middleware;
use axum::Router;

use crate::middleware::origin::origin_guard;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                 service health (no origin guard)
///
/// /generate               submit a job (POST, rate limited)
/// /status/{job_id}        resolve job status (GET)
/// /cancel/{job_id}        relay cancel to the provider (POST)
/// ```
///
/// Every job route sits behind the origin guard, which runs before rate
/// limiting and before any request validation.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let guarded = Router::new()
        .merge(generation::router(state))
        .route_layer(middleware::from_fn_with_state(state.clone(), origin_guard));

    Router::new().merge(health::router()).merge(guarded)
}
