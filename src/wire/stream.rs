use futures::{Sink, SinkExt};
use tokio_tungstenite::tungstenite::Message;

use super::messages::AudioChunkMessage;
use crate::error::{RelayError, Result};

/// State of one forward leg of a stream.
///
/// `Open` accepts chunks; sending the final marker moves the leg to
/// `Draining` (no further sends allowed); `Closed` means the remote end
/// acknowledged the close and all pending transcripts have drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Draining,
    Closed,
}

/// Sending half of a forward leg, enforcing the half-close invariant:
/// no chunk may follow the final marker.
pub struct ChunkSender<S> {
    sink: S,
    state: StreamState,
}

impl<S> ChunkSender<S>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            state: StreamState::Open,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Send one chunk message. Sending the final marker half-closes the leg.
    pub async fn send(&mut self, chunk: &AudioChunkMessage) -> Result<()> {
        if self.state != StreamState::Open {
            return Err(RelayError::Protocol(
                "audio chunk sent after half-close".to_string(),
            ));
        }

        self.sink
            .send(super::encode(chunk)?)
            .await
            .map_err(|e| RelayError::Send(e.to_string()))?;

        if chunk.final_chunk {
            self.state = StreamState::Draining;
        }

        Ok(())
    }

    /// Close the underlying sink entirely. Used on failure so the remote
    /// end aborts instead of waiting on a stream that will never finish.
    pub async fn abort(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.flush().await;
        self.state = StreamState::Closed;
    }
}
