//! Relay hop: forwards audio to the next hop and transcripts back
//!
//! Each inbound session gets exactly one outbound connection to the next
//! hop, opened before any chunk is read. Forwarding runs as two concurrent
//! tasks joined by a cancellation token: a failure in either direction
//! cancels the other instead of leaving it waiting on a stream that will
//! never finish. The session completes when the backward task finishes and
//! reports the first failure, if any.

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_async, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{RelayError, Result};
use crate::wire::{self, AudioChunkMessage, ChunkSender, StreamState, TranscriptMessage};

/// Accept inbound sessions forever, relaying each to `next_hop`.
pub async fn serve(listener: TcpListener, next_hop: String) -> Result<()> {
    info!(next_hop = %next_hop, "Relay accepting sessions");

    loop {
        let (stream, peer) = listener.accept().await?;
        let next_hop = next_hop.clone();
        tokio::spawn(async move {
            debug!(%peer, "Inbound session");
            if let Err(e) = handle_session(stream, &next_hop).await {
                error!(%peer, "Relay session failed: {e}");
            }
        });
    }
}

async fn handle_session(stream: TcpStream, next_hop: &str) -> Result<()> {
    let inbound = accept_async(stream)
        .await
        .map_err(|e| RelayError::Connect(format!("inbound handshake: {e}")))?;

    // One outbound connection per session, opened before any chunk is read
    let (outbound, _) = connect_async(next_hop)
        .await
        .map_err(|e| RelayError::Connect(format!("next hop at {next_hop}: {e}")))?;

    let (in_sink, in_stream) = inbound.split();
    let (out_sink, out_stream) = outbound.split();
    let cancel = CancellationToken::new();

    let forward = tokio::spawn(forward_audio(in_stream, out_sink, cancel.clone()));
    let backward = tokio::spawn(forward_transcripts(out_stream, in_sink, cancel.clone()));

    // The session completes only when the backward direction finishes.
    let backward_result = backward
        .await
        .map_err(|e| RelayError::Protocol(format!("backward task failed: {e}")))?;

    // No transcript can follow once the backward direction is done; a
    // still-running forward direction has nothing left to feed.
    cancel.cancel();
    let forward_result = forward
        .await
        .map_err(|e| RelayError::Protocol(format!("forward task failed: {e}")))?;

    // The forward failure came first whenever it triggered the cancellation.
    forward_result?;
    backward_result
}

/// Forward direction: inbound audio chunks to the outbound stream,
/// strictly in receipt order.
async fn forward_audio<R, S>(
    mut inbound: R,
    out_sink: S,
    cancel: CancellationToken,
) -> Result<()>
where
    R: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let mut sender = ChunkSender::new(out_sink);
    let mut session_id: Option<String> = None;
    let mut next_sequence: u32 = 0;
    let mut sample_rate: u32 = crate::audio::DEFAULT_SAMPLE_RATE;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                // backward direction failed; half-close so the next hop aborts
                sender.abort().await;
                return Ok(());
            }
            frame = inbound.next() => frame,
        };

        match frame {
            Some(Ok(msg @ Message::Text(_))) => {
                let chunk: AudioChunkMessage = match wire::decode(&msg) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        cancel.cancel();
                        sender.abort().await;
                        return Err(e);
                    }
                };

                session_id = Some(chunk.session_id.clone());
                next_sequence = chunk.sequence + 1;
                sample_rate = chunk.sample_rate;
                let done = chunk.final_chunk;

                // re-wrap and forward unchanged
                if let Err(e) = sender.send(&chunk).await {
                    cancel.cancel();
                    return Err(e);
                }

                if done {
                    debug!(session = %chunk.session_id, "Forward direction drained");
                    return Ok(());
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                // Caller closed without the in-band marker; synthesize the
                // half-close so the next hop still completes the session.
                if sender.state() == StreamState::Open {
                    let marker = AudioChunkMessage::final_marker(
                        session_id.as_deref().unwrap_or_default(),
                        next_sequence,
                        sample_rate,
                    );
                    if let Err(e) = sender.send(&marker).await {
                        cancel.cancel();
                        return Err(e);
                    }
                }
                return Ok(());
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                // Inbound stream died mid-session. Cancel the backward
                // direction rather than leaving it waiting for a
                // transcript that will never arrive.
                cancel.cancel();
                sender.abort().await;
                return Err(RelayError::Receive(format!("inbound stream: {e}")));
            }
        }
    }
}

/// Backward direction: transcripts from the outbound stream to the caller.
async fn forward_transcripts<R, S>(
    mut outbound: R,
    mut in_sink: S,
    cancel: CancellationToken,
) -> Result<()>
where
    R: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                // forward direction failed; release the caller
                let _ = in_sink.send(Message::Close(None)).await;
                return Ok(());
            }
            frame = outbound.next() => frame,
        };

        match frame {
            Some(Ok(msg @ Message::Text(_))) => {
                let transcript: TranscriptMessage = wire::decode(&msg)?;
                debug!(session = %transcript.session_id, "Forwarding transcript");
                in_sink
                    .send(wire::encode(&transcript)?)
                    .await
                    .map_err(|e| RelayError::Send(e.to_string()))?;
            }
            Some(Ok(Message::Close(_))) | None => {
                let _ = in_sink.send(Message::Close(None)).await;
                return Ok(());
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                // A failure behind us is the session's terminal error.
                cancel.cancel();
                let _ = in_sink.send(Message::Close(None)).await;
                return Err(RelayError::Receive(format!("next hop stream: {e}")));
            }
        }
    }
}
