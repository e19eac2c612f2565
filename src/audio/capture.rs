//! Microphone capture using cpal
//!
//! The cpal stream lives on a dedicated thread (cpal streams are not
//! `Send`); the device callback pushes sample blocks into a bounded
//! channel and `next_chunk` re-blocks them into fixed-size chunks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::source::AudioSource;
use crate::error::{RelayError, Result};

pub struct MicrophoneSource {
    sample_rate: u32,
    chunk_samples: usize,
    rx: mpsc::Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    stop: Arc<AtomicBool>,
}

impl MicrophoneSource {
    /// Open the named input device (or the default one) at the given rate.
    pub fn open(sample_rate: u32, chunk_samples: usize, device: Option<String>) -> Result<Self> {
        let (tx, rx) = mpsc::channel(64);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            run_stream(sample_rate, device, tx, stop_flag, ready_tx);
        });

        ready_rx
            .recv()
            .map_err(|_| RelayError::Microphone("capture thread exited".to_string()))??;

        Ok(Self {
            sample_rate,
            chunk_samples,
            rx,
            pending: VecDeque::new(),
            stop,
        })
    }
}

#[async_trait]
impl AudioSource for MicrophoneSource {
    async fn next_chunk(&mut self) -> Result<Vec<i16>> {
        while self.pending.len() < self.chunk_samples {
            let block = self
                .rx
                .recv()
                .await
                .ok_or_else(|| RelayError::Microphone("audio stream stopped".to_string()))?;
            self.pending.extend(block);
        }
        Ok(self.pending.drain(..self.chunk_samples).collect())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Own the cpal stream for the lifetime of the capture window.
fn run_stream(
    sample_rate: u32,
    device_name: Option<String>,
    tx: mpsc::Sender<Vec<i16>>,
    stop: Arc<AtomicBool>,
    ready_tx: std::sync::mpsc::Sender<Result<()>>,
) {
    let stream = match build_stream(sample_rate, device_name, tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(RelayError::Microphone(e.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(50));
    }
    // stream drops here, stopping capture
}

fn build_stream(
    sample_rate: u32,
    device_name: Option<String>,
    tx: mpsc::Sender<Vec<i16>>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| RelayError::Microphone(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| RelayError::Microphone(format!("device not found: {name}")))?,
        None => host
            .default_input_device()
            .ok_or_else(|| RelayError::Microphone("no input device available".to_string()))?,
    };

    let device_label = device.name().unwrap_or_else(|_| "unknown".to_string());
    info!("Using audio input device: {}", device_label);

    let default_config = device
        .default_input_config()
        .map_err(|e| RelayError::Microphone(e.to_string()))?;

    let channels = default_config.channels();
    let device_rate = default_config.sample_rate().0;
    let config = StreamConfig {
        channels,
        sample_rate: SampleRate(device_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    info!(
        "Audio config: {} channels @ {} Hz (target: {} Hz)",
        channels, device_rate, sample_rate
    );

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let samples = fold_to_target(data, channels as usize, device_rate, sample_rate);
                if tx.try_send(samples).is_err() {
                    warn!("Audio buffer overflow - dropping samples");
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| RelayError::Microphone(e.to_string()))?;

    Ok(stream)
}

/// Fold interleaved f32 frames to mono i16 at the target rate.
///
/// Resampling is plain decimation, which is adequate for speech capture
/// when the device rate is a multiple of the target rate.
fn fold_to_target(data: &[f32], channels: usize, device_rate: u32, target_rate: u32) -> Vec<i16> {
    let mono: Vec<f32> = if channels > 1 {
        data.chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        data.to_vec()
    };

    let step = device_rate as f32 / target_rate as f32;
    let out_len = (mono.len() as f32 / step) as usize;
    (0..out_len)
        .map(|i| {
            let sample = mono[((i as f32 * step) as usize).min(mono.len() - 1)];
            (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        })
        .collect()
}
