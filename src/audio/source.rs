use async_trait::async_trait;

use crate::error::Result;

/// Default capture sample rate in Hz (Whisper expects 16kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Default samples per chunk
pub const DEFAULT_CHUNK_SAMPLES: usize = 1024;

/// Audio capture collaborator
///
/// Implementations hand out one bounded-size block of 16-bit samples per
/// poll. The handle is owned exclusively by one capture window.
#[async_trait]
pub trait AudioSource: Send {
    /// Produce the next fixed-size block of samples, or an error if the
    /// underlying device failed.
    async fn next_chunk(&mut self) -> Result<Vec<i16>>;

    /// Sample rate of the produced blocks in Hz
    fn sample_rate(&self) -> u32;
}

/// Deterministic sine source for running the chain without a microphone
pub struct ToneSource {
    sample_rate: u32,
    chunk_samples: usize,
    frequency: f32,
    position: u64,
}

impl ToneSource {
    pub fn new(sample_rate: u32, chunk_samples: usize) -> Self {
        Self {
            sample_rate,
            chunk_samples,
            frequency: 440.0,
            position: 0,
        }
    }
}

#[async_trait]
impl AudioSource for ToneSource {
    async fn next_chunk(&mut self) -> Result<Vec<i16>> {
        let mut samples = Vec::with_capacity(self.chunk_samples);
        for _ in 0..self.chunk_samples {
            let t = self.position as f32 / self.sample_rate as f32;
            let value = (t * self.frequency * 2.0 * std::f32::consts::PI).sin();
            samples.push((value * i16::MAX as f32 * 0.5) as i16);
            self.position += 1;
        }
        Ok(samples)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tone_source_produces_fixed_size_chunks() {
        let mut source = ToneSource::new(16000, 1024);
        let first = source.next_chunk().await.unwrap();
        let second = source.next_chunk().await.unwrap();
        assert_eq!(first.len(), 1024);
        assert_eq!(second.len(), 1024);
        // the waveform advances between polls
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn tone_source_is_deterministic() {
        let mut a = ToneSource::new(16000, 256);
        let mut b = ToneSource::new(16000, 256);
        assert_eq!(a.next_chunk().await.unwrap(), b.next_chunk().await.unwrap());
    }
}
