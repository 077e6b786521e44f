//! Request gating middleware for the `/api` surface.
//!
//! - [`origin::origin_guard`] -- rejects callers whose `Origin` is not
//!   allow-listed (all job routes).
//! - [`rate_limit::rate_limit`] -- sliding-window limit per caller
//!   (submission route only).
//! - [`timeout::request_timeout`] -- whole-request deadline (every route).

pub mod origin;
pub mod rate_limit;
pub mod timeout;
