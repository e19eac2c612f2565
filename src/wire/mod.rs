//! Wire protocol between hops
//!
//! Each hop pair talks over one WebSocket connection per session. Audio
//! chunks flow forward as JSON text frames; transcripts flow backward on
//! the same connection. The half-close signal is an in-band final marker
//! so the backward direction stays open after the forward side finishes.

pub mod messages;
pub mod stream;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{RelayError, Result};

pub use messages::{bytes_to_samples, samples_to_bytes, AudioChunkMessage, TranscriptMessage};
pub use stream::{ChunkSender, StreamState};

/// Serialize a message into a WebSocket text frame.
pub fn encode<T: Serialize>(value: &T) -> Result<Message> {
    let text = serde_json::to_string(value)
        .map_err(|e| RelayError::Protocol(format!("failed to encode frame: {e}")))?;
    Ok(Message::Text(text))
}

/// Deserialize a WebSocket text frame.
pub fn decode<T: DeserializeOwned>(msg: &Message) -> Result<T> {
    let text = msg
        .to_text()
        .map_err(|e| RelayError::Protocol(format!("non-text frame: {e}")))?;
    serde_json::from_str(text).map_err(|e| RelayError::Protocol(format!("malformed frame: {e}")))
}
