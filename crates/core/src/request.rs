//! Generation request parsing, defaults, and bounds.
//!
//! Callers send loosely-typed JSON. Text fields are required; numeric
//! fields fall back to their defaults when missing or non-numeric and are
//! then clamped to the ranges the provider worker accepts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults and bounds
// ---------------------------------------------------------------------------

/// Requested audio length when the caller does not specify one (2 minutes).
pub const DEFAULT_DURATION_MS: u32 = 120_000;
/// Hard ceiling on requested audio length (4 minutes).
pub const MAX_DURATION_MS: u32 = 240_000;
pub const MIN_DURATION_MS: u32 = 0;

pub const DEFAULT_TEMPERATURE: f64 = 1.0;
pub const MIN_TEMPERATURE: f64 = 0.1;
pub const MAX_TEMPERATURE: f64 = 5.0;

pub const DEFAULT_TOPK: u32 = 50;
pub const MIN_TOPK: u32 = 1;
pub const MAX_TOPK: u32 = 200;

pub const DEFAULT_CFG_SCALE: f64 = 1.5;
pub const MIN_CFG_SCALE: f64 = 0.1;
pub const MAX_CFG_SCALE: f64 = 10.0;

pub const LYRICS_REQUIRED: &str = "lyrics is required";
pub const TAGS_REQUIRED: &str = "tags is required";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A validated, normalized music generation request.
///
/// Construct with [`GenerationRequest::from_json`] for untrusted input or
/// [`GenerationRequest::new`] plus field updates followed by
/// [`GenerationRequest::normalized`] for typed callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub lyrics: String,
    /// Comma-separated style tags, e.g. `"piano, happy, pop"`.
    pub tags: String,
    pub duration_ms: u32,
    pub temperature: f64,
    pub topk: u32,
    pub cfg_scale: f64,
}

impl GenerationRequest {
    /// Build a request with default sampling parameters.
    pub fn new(lyrics: impl Into<String>, tags: impl Into<String>) -> Self {
        Self {
            lyrics: lyrics.into(),
            tags: tags.into(),
            duration_ms: DEFAULT_DURATION_MS,
            temperature: DEFAULT_TEMPERATURE,
            topk: DEFAULT_TOPK,
            cfg_scale: DEFAULT_CFG_SCALE,
        }
    }

    /// Parse and validate an untrusted JSON payload.
    ///
    /// Fails with [`CoreError::Validation`] carrying exactly
    /// [`LYRICS_REQUIRED`] or [`TAGS_REQUIRED`] when a text field is
    /// missing, not a string, or blank after trimming. Lyrics are checked
    /// first.
    pub fn from_json(payload: &Value) -> Result<Self, CoreError> {
        let lyrics = required_text(payload, "lyrics", LYRICS_REQUIRED)?;
        let tags = required_text(payload, "tags", TAGS_REQUIRED)?;

        let request = Self {
            lyrics,
            tags,
            duration_ms: clamp_int(
                parse_int(payload.get("duration_ms"), DEFAULT_DURATION_MS as i64),
                MIN_DURATION_MS,
                MAX_DURATION_MS,
            ),
            temperature: parse_float(payload.get("temperature"), DEFAULT_TEMPERATURE)
                .clamp(MIN_TEMPERATURE, MAX_TEMPERATURE),
            topk: clamp_int(
                parse_int(payload.get("topk"), DEFAULT_TOPK as i64),
                MIN_TOPK,
                MAX_TOPK,
            ),
            cfg_scale: parse_float(payload.get("cfg_scale"), DEFAULT_CFG_SCALE)
                .clamp(MIN_CFG_SCALE, MAX_CFG_SCALE),
        };

        Ok(request)
    }

    /// Check the text-field invariant without touching numeric fields.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.lyrics.trim().is_empty() {
            return Err(CoreError::Validation(LYRICS_REQUIRED.to_string()));
        }
        if self.tags.trim().is_empty() {
            return Err(CoreError::Validation(TAGS_REQUIRED.to_string()));
        }
        Ok(())
    }

    /// Trim text fields and clamp every numeric field into bounds.
    ///
    /// Non-finite floats are replaced by their defaults.
    pub fn normalized(self) -> Self {
        let finite_or = |v: f64, default: f64| if v.is_finite() { v } else { default };
        Self {
            lyrics: self.lyrics.trim().to_string(),
            tags: self.tags.trim().to_string(),
            duration_ms: self.duration_ms.clamp(MIN_DURATION_MS, MAX_DURATION_MS),
            temperature: finite_or(self.temperature, DEFAULT_TEMPERATURE)
                .clamp(MIN_TEMPERATURE, MAX_TEMPERATURE),
            topk: self.topk.clamp(MIN_TOPK, MAX_TOPK),
            cfg_scale: finite_or(self.cfg_scale, DEFAULT_CFG_SCALE)
                .clamp(MIN_CFG_SCALE, MAX_CFG_SCALE),
        }
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn required_text(payload: &Value, field: &str, message: &str) -> Result<String, CoreError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CoreError::Validation(message.to_string()))
}

/// Parse an integer from a JSON number or numeric string.
///
/// Fractional values are truncated toward zero. Anything else yields
/// `default`.
fn parse_int(value: Option<&Value>, default: i64) -> i64 {
    let truncate = |f: f64| f.is_finite().then(|| f.trunc() as i64);
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(truncate))
            .unwrap_or(default),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
                .unwrap_or(default)
        }
        _ => default,
    }
}

/// Parse a finite float from a JSON number or numeric string.
fn parse_float(value: Option<&Value>, default: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(default)
}

fn clamp_int(value: i64, min: u32, max: u32) -> u32 {
    value.clamp(i64::from(min), i64::from(max)) as u32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
