use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use heartmula_runpod::api::DEFAULT_BASE_URL;
use heartmula_runpod::RunPodConfig;

/// Server configuration loaded from environment variables.
///
/// The RunPod credentials are required; everything else has a default
/// suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3001`).
    pub port: u16,
    /// Origins allowed to call `/api/*`, parsed from comma-separated
    /// `ALLOWED_ORIGINS`.
    pub allowed_origins: Vec<String>,
    /// Whether requests without an `Origin` header (curl, server-to-server)
    /// pass the origin guard.
    pub allow_missing_origin: bool,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Timeout for a single provider call. Always shorter than the request
    /// timeout so a hung provider surfaces as a 502, not a 408.
    pub provider_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    /// Key rate-limit buckets on the first `X-Forwarded-For` entry instead
    /// of the peer address. Only enable behind a trusted proxy.
    pub trust_forwarded_for: bool,
    pub runpod: RunPodConfig,
}

/// Sliding-window limit on the submission route.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be a valid {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `RUNPOD_API_KEY`          | required                |
    /// | `RUNPOD_ENDPOINT_ID`      | required                |
    /// | `RUNPOD_BASE_URL`         | `https://api.runpod.ai/v2` |
    /// | `ALLOWED_ORIGINS`         | `http://localhost:5173` |
    /// | `ALLOW_MISSING_ORIGIN`    | `true`                  |
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3001`                  |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `PROVIDER_TIMEOUT_SECS`   | request timeout - 5s    |
    /// | `RATE_LIMIT_MAX_REQUESTS` | `10`                    |
    /// | `RATE_LIMIT_WINDOW_SECS`  | `60`                    |
    /// | `TRUST_FORWARDED_FOR`     | `false`                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let api_key = required("RUNPOD_API_KEY")?;
        let endpoint_id = required("RUNPOD_ENDPOINT_ID")?;
        let base_url = lookup("RUNPOD_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());

        let allowed_origins: Vec<String> = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = allowed_origins
            .iter()
            .find(|o| HeaderValue::from_str(o).is_err())
        {
            return Err(ConfigError::Invalid {
                name: "ALLOWED_ORIGINS",
                expected: "origin list",
                value: bad.clone(),
            });
        }

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "PORT", "u16", 3001)?;
        let request_timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", "u64", 30)?;
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "REQUEST_TIMEOUT_SECS",
                expected: "positive integer",
                value: "0".into(),
            });
        }
        let request_timeout = Duration::from_secs(request_timeout_secs);
        let provider_timeout = match lookup("PROVIDER_TIMEOUT_SECS") {
            None => default_provider_timeout(request_timeout),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 && secs < request_timeout_secs => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "PROVIDER_TIMEOUT_SECS",
                        expected: "positive integer below REQUEST_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
        };
        let allow_missing_origin = parse_or(&lookup, "ALLOW_MISSING_ORIGIN", "bool", true)?;
        let trust_forwarded_for = parse_or(&lookup, "TRUST_FORWARDED_FOR", "bool", false)?;

        let rate_limit = RateLimitConfig {
            max_requests: parse_or(&lookup, "RATE_LIMIT_MAX_REQUESTS", "u32", 10)?,
            window_secs: parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", "u64", 60)?,
        };

        Ok(Self {
            host,
            port,
            allowed_origins,
            allow_missing_origin,
            request_timeout_secs,
            provider_timeout,
            rate_limit,
            trust_forwarded_for,
            runpod: RunPodConfig {
                base_url,
                endpoint_id,
                api_key,
            },
        })
    }
}

/// Leave up to 5s (a quarter of short timeouts) for the gateway to answer
/// after the provider call gives up.
pub fn default_provider_timeout(request_timeout: Duration) -> Duration {
    let margin = (request_timeout / 4).min(Duration::from_secs(5));
    request_timeout - margin
}

/// Parse an optional variable, falling back to `default` when unset.
/// A set but unparseable value is an error.
fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value: raw,
        }),
    }
}
