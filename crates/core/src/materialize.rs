//! Result materialization: base64 payload to a local binary artifact.
//!
//! Decoding is a pure base64 transform. The decoded bytes are not
//! inspected, so a payload that decodes cleanly is accepted even if it is
//! not valid audio.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::CoreError;
use crate::job::JobHandle;

/// Media type of the audio produced by the provider worker.
pub const AUDIO_MPEG: &str = "audio/mpeg";

/// A decoded result held in memory, tagged with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    bytes: Vec<u8>,
    media_type: String,
}

impl AudioArtifact {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// File extension for the media type (`bin` when unknown).
    pub fn extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/flac" => "flac",
            "audio/ogg" => "ogg",
            _ => "bin",
        }
    }

    /// Download name for the artifact, e.g. `heartmula-<job id>.mp3`.
    pub fn suggested_file_name(&self, job_id: &JobHandle) -> String {
        format!("heartmula-{job_id}.{}", self.extension())
    }

    /// Persist the artifact to `path`, replacing any existing file.
    pub async fn save_to(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        tokio::fs::write(path, &self.bytes).await
    }
}

/// Decode a base64 payload into an [`AudioArtifact`].
///
/// Surrounding whitespace is ignored. Malformed input (illegal characters,
/// bad padding) fails with [`CoreError::Materialization`].
pub fn materialize(encoded: &str, media_type: &str) -> Result<AudioArtifact, CoreError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CoreError::Materialization(format!("Invalid audio payload: {e}")))?;

    Ok(AudioArtifact {
        bytes,
        media_type: media_type.to_string(),
    })
}
