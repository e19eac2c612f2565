//! Whisper-based transcriber

use std::path::Path;

use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::Transcriber;
use crate::error::{RelayError, Result};
use crate::wire::bytes_to_samples;

pub struct WhisperTranscriber {
    ctx: WhisperContext,
    language: String,
    threads: i32,
}

impl WhisperTranscriber {
    /// Load a Whisper model. A missing model file is a configuration
    /// error, reported before any session is accepted.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            return Err(RelayError::ModelUnavailable(
                model_path.display().to_string(),
            ));
        }

        info!("Loading Whisper model from: {}", model_path.display());

        let ctx = WhisperContext::new_with_params(
            model_path.to_str().unwrap_or_default(),
            WhisperContextParameters::default(),
        )
        .map_err(|e| RelayError::ModelUnavailable(e.to_string()))?;

        info!("Whisper model loaded successfully");

        Ok(Self {
            ctx,
            language: "en".to_string(),
            threads: num_threads(),
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, pcm: &[u8], sample_rate: u32) -> Result<String> {
        let samples: Vec<f32> = bytes_to_samples(pcm)
            .iter()
            .map(|&s| s as f32 / i16::MAX as f32)
            .collect();

        if samples.is_empty() {
            return Ok(String::new());
        }

        debug!(
            "Transcribing {} samples ({:.2}s)",
            samples.len(),
            samples.len() as f32 / sample_rate as f32
        );

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.threads);
        params.set_language(Some(&self.language));
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_no_context(true);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| RelayError::Transcription(e.to_string()))?;

        state
            .full(params, &samples)
            .map_err(|e| RelayError::Transcription(e.to_string()))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| RelayError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..num_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| RelayError::Transcription(e.to_string()))?;
            if !text.is_empty() && !segment.starts_with(' ') {
                text.push(' ');
            }
            text.push_str(segment.trim());
        }

        debug!("Transcription complete: {} chars", text.len());

        Ok(text.trim().to_string())
    }
}

fn num_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}
