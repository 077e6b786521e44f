use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use heartmula_core::request::GenerationRequest;
use heartmula_poller::PollerConfig;

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:3001";
pub const DEFAULT_OUTPUT_PATH: &str = "output.mp3";

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway root, without the `/api` suffix.
    pub gateway_url: String,
    /// Sent as the `Origin` header when the gateway requires one.
    pub origin: Option<String>,
    /// File holding the lyrics text.
    pub lyrics_file: PathBuf,
    pub tags: String,
    pub output_path: PathBuf,
    pub duration_ms: Option<u32>,
    pub temperature: Option<f64>,
    pub topk: Option<u32>,
    pub cfg_scale: Option<f64>,
    pub poll: PollerConfig,
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

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `LYRICS_FILE`                   | required                |
    /// | `TAGS`                          | required                |
    /// | `GATEWAY_URL`                   | `http://localhost:3001` |
    /// | `GATEWAY_ORIGIN`                | unset                   |
    /// | `OUTPUT_PATH`                   | `output.mp3`            |
    /// | `DURATION_MS`                   | server default          |
    /// | `TEMPERATURE`                   | server default          |
    /// | `TOPK`                          | server default          |
    /// | `CFG_SCALE`                     | server default          |
    /// | `POLL_INTERVAL_SECS`            | `3`                     |
    /// | `POLL_MAX_CONSECUTIVE_FAILURES` | unlimited               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let lyrics_file = non_blank("LYRICS_FILE")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("LYRICS_FILE"))?;
        let tags = non_blank("TAGS").ok_or(ConfigError::Missing("TAGS"))?;

        let gateway_url = non_blank("GATEWAY_URL").unwrap_or_else(|| DEFAULT_GATEWAY_URL.into());
        let output_path =
            PathBuf::from(non_blank("OUTPUT_PATH").unwrap_or_else(|| DEFAULT_OUTPUT_PATH.into()));

        let interval_secs: u64 = parse_opt(&lookup, "POLL_INTERVAL_SECS", "u64")?.unwrap_or(3);
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "POLL_INTERVAL_SECS",
                expected: "positive integer",
                value: "0".into(),
            });
        }

        let poll = PollerConfig {
            interval: Duration::from_secs(interval_secs),
            max_consecutive_failures: parse_opt(&lookup, "POLL_MAX_CONSECUTIVE_FAILURES", "u32")?,
            ..PollerConfig::default()
        };

        Ok(Self {
            gateway_url,
            origin: non_blank("GATEWAY_ORIGIN"),
            lyrics_file,
            tags,
            output_path,
            duration_ms: parse_opt(&lookup, "DURATION_MS", "u32")?,
            temperature: parse_opt(&lookup, "TEMPERATURE", "number")?,
            topk: parse_opt(&lookup, "TOPK", "u32")?,
            cfg_scale: parse_opt(&lookup, "CFG_SCALE", "number")?,
            poll,
        })
    }

    /// Build the request from the loaded lyrics text. Unset parameters
    /// keep the request defaults.
    pub fn request(&self, lyrics: impl Into<String>) -> GenerationRequest {
        let mut request = GenerationRequest::new(lyrics, self.tags.clone());
        if let Some(duration_ms) = self.duration_ms {
            request.duration_ms = duration_ms;
        }
        if let Some(temperature) = self.temperature {
            request.temperature = temperature;
        }
        if let Some(topk) = self.topk {
            request.topk = topk;
        }
        if let Some(cfg_scale) = self.cfg_scale {
            request.cfg_scale = cfg_scale;
        }
        request
    }
}

fn parse_opt<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name,
                expected,
                value: raw,
            }),
    }
}
