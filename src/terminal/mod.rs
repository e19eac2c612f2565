//! Terminal hop: buffers a session to completion and transcribes it
//!
//! Chunks are appended strictly in arrival order into one in-memory
//! buffer; the whole payload is held for the duration of the session (an
//! explicit simplicity trade-off, not streaming recognition). At the
//! half-close the transcriber collaborator is invoked exactly once, on the
//! blocking pool under a timeout, and exactly one transcript goes back.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::error::{RelayError, Result};
use crate::stt::Transcriber;
use crate::wire::{self, AudioChunkMessage, TranscriptMessage};

/// Accept inbound sessions forever, transcribing each with `transcriber`.
pub async fn serve(
    listener: TcpListener,
    transcriber: Arc<dyn Transcriber>,
    timeout: Duration,
) -> Result<()> {
    info!("Terminal hop accepting sessions");

    loop {
        let (stream, peer) = listener.accept().await?;
        let transcriber = Arc::clone(&transcriber);
        tokio::spawn(async move {
            debug!(%peer, "Inbound session");
            if let Err(e) = handle_session(stream, transcriber, timeout).await {
                error!(%peer, "Session failed: {e}");
            }
        });
    }
}

async fn handle_session(
    stream: TcpStream,
    transcriber: Arc<dyn Transcriber>,
    timeout: Duration,
) -> Result<()> {
    let mut ws = accept_async(stream)
        .await
        .map_err(|e| RelayError::Connect(format!("inbound handshake: {e}")))?;

    // Receiving: strict append, no reordering or deduplication
    let mut buffer: Vec<u8> = Vec::new();
    let mut session_id: Option<String> = None;
    let mut sample_rate = DEFAULT_SAMPLE_RATE;
    let mut chunks: u32 = 0;

    loop {
        match ws.next().await {
            Some(Ok(msg @ Message::Text(_))) => {
                let chunk: AudioChunkMessage = wire::decode(&msg)?;
                if session_id.is_none() {
                    session_id = Some(chunk.session_id.clone());
                    sample_rate = chunk.sample_rate;
                }
                buffer.extend_from_slice(&chunk.payload()?);
                if chunk.final_chunk {
                    break;
                }
                chunks += 1;
            }
            Some(Ok(Message::Close(_))) | None => {
                // The half-close is the in-band final marker; a bare close
                // before it means the stream died, so no transcription.
                return Err(RelayError::Receive(
                    "stream closed before final chunk".to_string(),
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(RelayError::Receive(e.to_string())),
        }
    }

    let session_id = session_id.unwrap_or_default();

    info!(
        session = %session_id,
        chunks,
        bytes = buffer.len(),
        "Audio stream complete, transcribing"
    );

    // Transcribing: one collaborator call, bounded by the timeout. An
    // empty buffer is still transcribed.
    let text = run_transcription(transcriber, buffer, sample_rate, timeout).await?;

    info!(session = %session_id, "Transcription: {}", text);

    // Sent: exactly one transcript per completed stream
    let transcript = TranscriptMessage::new(&session_id, text);
    ws.send(wire::encode(&transcript)?)
        .await
        .map_err(|e| RelayError::Send(e.to_string()))?;

    let _ = ws.close(None).await;

    Ok(())
}

/// Run the blocking collaborator call on the blocking pool, bounded by
/// `timeout`. The underlying call is not interruptible once started; on
/// expiry the session fails with a distinct timeout error and the call is
/// left to finish in the background.
async fn run_transcription(
    transcriber: Arc<dyn Transcriber>,
    pcm: Vec<u8>,
    sample_rate: u32,
    timeout: Duration,
) -> Result<String> {
    let call = tokio::task::spawn_blocking(move || transcriber.transcribe(&pcm, sample_rate));

    match tokio::time::timeout(timeout, call).await {
        Err(_) => Err(RelayError::TranscriptionTimeout(timeout)),
        Ok(Err(join_err)) => Err(RelayError::Transcription(format!(
            "transcriber panicked: {join_err}"
        ))),
        Ok(Ok(result)) => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SleepyTranscriber(Duration);

    impl Transcriber for SleepyTranscriber {
        fn transcribe(&self, _pcm: &[u8], _sample_rate: u32) -> Result<String> {
            std::thread::sleep(self.0);
            Ok("late".to_string())
        }
    }

    #[tokio::test]
    async fn stuck_collaborator_yields_timeout_error() {
        let transcriber = Arc::new(SleepyTranscriber(Duration::from_secs(5)));
        let result = run_transcription(
            transcriber,
            vec![0; 16],
            16000,
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(result, Err(RelayError::TranscriptionTimeout(_))));
    }

    #[tokio::test]
    async fn fast_collaborator_completes() {
        let transcriber = Arc::new(SleepyTranscriber(Duration::from_millis(1)));
        let result = run_transcription(transcriber, vec![], 16000, Duration::from_secs(1)).await;
        assert_eq!(result.unwrap(), "late");
    }
}
