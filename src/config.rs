use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RelayError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub relay: RelayConfig,
    pub transcriber: TranscriberConfig,
}

/// Settings for the capture hop (microphone client)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// WebSocket URL of the relay hop
    pub relay_url: String,
    /// Capture sample rate in Hz (Whisper expects 16kHz)
    pub sample_rate: u32,
    /// Samples per chunk sent over the stream
    pub chunk_samples: usize,
    /// Capture window length in seconds (bounded by sample count, not wall clock)
    pub window_secs: f64,
    /// Input device name (default device if not set)
    pub device: Option<String>,
}

/// Settings for the relay hop
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the relay listens on
    pub listen: String,
    /// WebSocket URL of the terminal hop
    pub next_hop: String,
}

/// Settings for the terminal hop (transcription producer)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    /// Address the terminal hop listens on
    pub listen: String,
    /// Path to the Whisper model file
    pub model_path: PathBuf,
    /// Upper bound on one transcription call, in seconds
    pub timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:50051".to_string(),
            sample_rate: 16000, // Whisper expects 16kHz
            chunk_samples: 1024,
            window_secs: 5.0,
            device: None,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:50051".to_string(),
            next_hop: "ws://127.0.0.1:50052".to_string(),
        }
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:50052".to_string(),
            model_path: PathBuf::from("models/ggml-base.en.bin"),
            timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration, layering an optional TOML file over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .build()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| RelayError::Config(e.to_string()))
    }
}
