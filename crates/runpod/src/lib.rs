//! Client for the RunPod serverless endpoint that hosts the HeartMuLa
//! worker.
//!
//! - [`api::RunPodApi`] -- thin REST wrapper (`/run`, `/status`, `/cancel`).
//! - [`resolver`] -- normalizes raw status payloads into
//!   [`heartmula_core::job::StatusReport`].
//!
//! [`api::RunPodApi`] implements [`heartmula_core::backend::JobBackend`].

pub mod api;
pub mod resolver;

pub use api::{RunPodApi, RunPodApiError, RunPodConfig};
