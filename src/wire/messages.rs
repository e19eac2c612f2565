use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Audio chunk message sent in the forward direction of a stream.
///
/// PCM payloads are little-endian 16-bit samples, base64-encoded. The
/// `final` marker with an empty payload is the half-close: it tells the
/// receiver that no further chunks follow on this stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunkMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub timestamp: String, // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_chunk: bool,
}

/// Transcript message sent in the backward direction of a stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub timestamp: String,
}

impl AudioChunkMessage {
    pub fn new(session_id: &str, sequence: u32, pcm_bytes: &[u8], sample_rate: u32) -> Self {
        Self {
            session_id: session_id.to_string(),
            sequence,
            pcm: base64::engine::general_purpose::STANDARD.encode(pcm_bytes),
            sample_rate,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_chunk: false,
        }
    }

    /// Half-close marker: empty payload, `final` set.
    pub fn final_marker(session_id: &str, sequence: u32, sample_rate: u32) -> Self {
        Self {
            session_id: session_id.to_string(),
            sequence,
            pcm: String::new(),
            sample_rate,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_chunk: true,
        }
    }

    /// Decode the base64 PCM payload back into raw bytes.
    pub fn payload(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.pcm)
            .map_err(|e| RelayError::Protocol(format!("invalid pcm encoding: {e}")))
    }
}

impl TranscriptMessage {
    pub fn new(session_id: &str, text: String) -> Self {
        Self {
            session_id: session_id.to_string(),
            text,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Convert 16-bit samples to little-endian bytes for transmission.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Convert little-endian PCM bytes back into 16-bit samples.
///
/// A trailing odd byte is dropped.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
