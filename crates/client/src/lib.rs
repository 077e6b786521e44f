//! Command-line caller for the generation gateway.
//!
//! [`GatewayClient`] speaks the gateway's `/api` surface and plugs into
//! [`heartmula_poller::GenerationSession`] like any other job backend.

pub mod config;
pub mod gateway;

pub use config::{ClientConfig, ConfigError};
pub use gateway::GatewayClient;
