//! Capture hop: the originating client of the relay chain
//!
//! Opens one WebSocket session to the relay, streams a bounded window of
//! microphone chunks forward, half-closes with the final marker, then
//! drains transcripts on the same connection until the server closes.

use std::time::Duration;

use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audio::AudioSource;
use crate::error::{RelayError, Result};
use crate::wire::{self, AudioChunkMessage, ChunkSender, TranscriptMessage};

/// Result of one capture session
#[derive(Debug)]
pub struct SessionOutcome {
    /// Session id threaded through every chunk of this window
    pub session_id: String,
    /// Transcripts received back, in arrival order
    pub transcripts: Vec<TranscriptMessage>,
}

/// Run one capture session against the relay hop.
///
/// The window is bounded by sample count (`window` x source sample rate),
/// not wall clock. A send or microphone failure stops capture early; the
/// stream is still half-closed and drained so a transcript for the partial
/// window can come back.
pub async fn run_session(
    relay_url: &str,
    window: Duration,
    source: &mut dyn AudioSource,
) -> Result<SessionOutcome> {
    let session_id = format!("session-{}", Uuid::new_v4());
    let sample_rate = source.sample_rate();

    info!(session = %session_id, url = relay_url, "Opening relay session");

    let (ws, _) = connect_async(relay_url)
        .await
        .map_err(|e| RelayError::Connect(format!("relay at {relay_url}: {e}")))?;
    let (sink, mut stream) = ws.split();
    let mut sender = ChunkSender::new(sink);

    let window_samples = (window.as_secs_f64() * sample_rate as f64).round() as u64;
    let mut sent_samples: u64 = 0;
    let mut sequence: u32 = 0;

    info!(
        session = %session_id,
        samples = window_samples,
        "Recording audio"
    );

    while sent_samples < window_samples {
        let samples = match source.next_chunk().await {
            Ok(samples) => samples,
            Err(e) => {
                warn!(session = %session_id, "Microphone read failed: {e}");
                break;
            }
        };

        let chunk = AudioChunkMessage::new(
            &session_id,
            sequence,
            &wire::samples_to_bytes(&samples),
            sample_rate,
        );

        if let Err(e) = sender.send(&chunk).await {
            warn!(session = %session_id, "Chunk send failed: {e}");
            break;
        }

        sent_samples += samples.len() as u64;
        sequence += 1;
    }

    info!(
        session = %session_id,
        chunks = sequence,
        samples = sent_samples,
        "Capture window finished, half-closing"
    );

    sender
        .send(&AudioChunkMessage::final_marker(
            &session_id,
            sequence,
            sample_rate,
        ))
        .await?;

    let mut transcripts = Vec::new();
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(msg @ Message::Text(_)) => {
                let transcript: TranscriptMessage = wire::decode(&msg)?;
                info!(
                    session = %transcript.session_id,
                    "Transcript received: {}",
                    transcript.text
                );
                transcripts.push(transcript);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => return Err(RelayError::Receive(e.to_string())),
        }
    }

    Ok(SessionOutcome {
        session_id,
        transcripts,
    })
}
