//! Sliding-window rate limiting for the submission route.
//!
//! Each caller gets a log of request timestamps within the last window.
//! A request is admitted only if fewer than `max_requests` remain in the
//! log; otherwise it is rejected immediately with the time until the
//! oldest entry leaves the window. Nothing is queued or delayed.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Bucket key used when the caller cannot be identified.
const UNKNOWN_CLIENT: &str = "unknown";

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests as usize,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request from `key` now. On rejection returns how long
    /// until the caller may retry.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut hits = self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let log = hits.entry(key.to_string()).or_default();
        evict_expired(log, now, self.window);

        if log.len() >= self.max_requests {
            let retry_after = log
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            return Err(retry_after);
        }

        log.push_back(now);
        Ok(())
    }

    /// Drop callers with no requests inside the window. Returns how many
    /// buckets were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut hits = self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = hits.len();
        hits.retain(|_, log| {
            evict_expired(log, now, self.window);
            !log.is_empty()
        });
        before - hits.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.hits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

fn evict_expired(log: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while log
        .front()
        .is_some_and(|t| now.duration_since(*t) >= window)
    {
        log.pop_front();
    }
}

/// Identify the caller: first `X-Forwarded-For` hop when trusted, else the
/// peer IP.
fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Reject the request with 429 when the caller is over the limit.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_key(&request, state.config.trust_forwarded_for);

    if let Err(retry_after) = state.rate_limiter.check(&key) {
        // Round up so clients never retry a moment too early.
        let retry_after_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
        tracing::warn!(client = %key, retry_after_secs, "Rate limit exceeded");
        return Err(AppError::RateLimited { retry_after_secs });
    }

    Ok(next.run(request).await)
}
