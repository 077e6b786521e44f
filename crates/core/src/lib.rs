//! Domain types for the HeartMuLa generation job lifecycle.
//!
//! Everything here is transport-agnostic: request parsing and validation,
//! the job status state machine, provider output payloads, result
//! materialization, and the [`backend::JobBackend`] seam that the provider
//! client and the gateway client both implement.

pub mod backend;
pub mod error;
pub mod job;
pub mod materialize;
pub mod request;
