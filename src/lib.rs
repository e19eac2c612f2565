pub mod audio;
pub mod config;
pub mod error;
pub mod originator;
pub mod relay;
pub mod stt;
pub mod terminal;
pub mod wire;

pub use audio::{AudioSource, ToneSource, DEFAULT_CHUNK_SAMPLES, DEFAULT_SAMPLE_RATE};
pub use config::{CaptureConfig, Config, RelayConfig, TranscriberConfig};
pub use error::{RelayError, Result};
pub use originator::SessionOutcome;
pub use stt::Transcriber;
pub use wire::{AudioChunkMessage, ChunkSender, StreamState, TranscriptMessage};
