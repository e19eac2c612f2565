//! Error types for the relay chain

use std::time::Duration;
use thiserror::Error;

/// Main error type for the relay chain
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Stream send failed: {0}")]
    Send(String),

    #[error("Stream receive failed: {0}")]
    Receive(String),

    #[error("Microphone error: {0}")]
    Microphone(String),

    #[error("Transcription model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Transcription timed out after {0:?}")]
    TranscriptionTimeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
