//! Speech-to-text collaborator seam
//!
//! The terminal hop calls a [`Transcriber`] exactly once per session with
//! the fully buffered audio. The call is blocking and runs on the blocking
//! pool, bounded by a timeout at the call site.

#[cfg(feature = "whisper")]
pub mod engine;

use crate::error::Result;

/// External transcription collaborator
pub trait Transcriber: Send + Sync {
    /// Transcribe a complete buffer of little-endian 16-bit PCM at the
    /// given sample rate. An empty buffer yields an empty transcript, not
    /// an error.
    fn transcribe(&self, pcm: &[u8], sample_rate: u32) -> Result<String>;
}

#[cfg(feature = "whisper")]
pub use engine::WhisperTranscriber;
