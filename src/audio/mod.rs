pub mod source;

#[cfg(feature = "cpal-audio")]
pub mod capture;

pub use source::{AudioSource, ToneSource, DEFAULT_CHUNK_SAMPLES, DEFAULT_SAMPLE_RATE};

#[cfg(feature = "cpal-audio")]
pub use capture::MicrophoneSource;
