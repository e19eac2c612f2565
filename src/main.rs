use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use voicerelay::{originator, relay, terminal, Config, SessionOutcome, ToneSource};

/// Three-hop audio relay transcription chain
#[derive(Parser)]
#[command(name = "voicerelay")]
#[command(about = "Relays live audio through chained hops and returns the transcript", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one window of audio and print the transcript
    Capture {
        /// Audio input device name (uses default if not specified)
        #[arg(short, long)]
        device: Option<String>,

        /// Use the built-in tone source instead of a microphone
        #[arg(long)]
        tone: bool,
    },
    /// Run the relay hop
    Relay,
    /// Run the terminal transcription hop
    Transcribe {
        /// Path to Whisper model file
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Capture { device, tone } => {
            let outcome = run_capture(&cfg, device, tone).await?;
            for transcript in &outcome.transcripts {
                println!("{}", transcript.text);
            }
        }
        Commands::Relay => {
            let listener = TcpListener::bind(&cfg.relay.listen)
                .await
                .with_context(|| format!("Failed to listen on {}", cfg.relay.listen))?;
            info!("Relay hop listening on {}", cfg.relay.listen);
            relay::serve(listener, cfg.relay.next_hop.clone()).await?;
        }
        Commands::Transcribe { model } => {
            let listener = TcpListener::bind(&cfg.transcriber.listen)
                .await
                .with_context(|| format!("Failed to listen on {}", cfg.transcriber.listen))?;
            info!("Terminal hop listening on {}", cfg.transcriber.listen);
            let transcriber = load_transcriber(&cfg, model)?;
            let timeout = Duration::from_secs(cfg.transcriber.timeout_secs);
            terminal::serve(listener, transcriber, timeout).await?;
        }
    }

    Ok(())
}

async fn run_capture(cfg: &Config, device: Option<String>, tone: bool) -> Result<SessionOutcome> {
    let capture = &cfg.capture;
    let window = Duration::from_secs_f64(capture.window_secs);

    let outcome = if tone {
        let mut source = ToneSource::new(capture.sample_rate, capture.chunk_samples);
        originator::run_session(&capture.relay_url, window, &mut source).await?
    } else {
        let mut source = open_microphone(cfg, device)?;
        originator::run_session(&capture.relay_url, window, source.as_mut()).await?
    };

    info!(
        session = %outcome.session_id,
        transcripts = outcome.transcripts.len(),
        "Session complete"
    );

    Ok(outcome)
}

#[cfg(feature = "cpal-audio")]
fn open_microphone(
    cfg: &Config,
    device: Option<String>,
) -> Result<Box<dyn voicerelay::AudioSource>> {
    let capture = &cfg.capture;
    let source = voicerelay::audio::MicrophoneSource::open(
        capture.sample_rate,
        capture.chunk_samples,
        device.or_else(|| capture.device.clone()),
    )?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "cpal-audio"))]
fn open_microphone(
    _cfg: &Config,
    _device: Option<String>,
) -> Result<Box<dyn voicerelay::AudioSource>> {
    anyhow::bail!("Built without the cpal-audio feature; use --tone for a synthetic source")
}

#[cfg(feature = "whisper")]
fn load_transcriber(
    cfg: &Config,
    model: Option<PathBuf>,
) -> Result<Arc<dyn voicerelay::Transcriber>> {
    let path = model.unwrap_or_else(|| cfg.transcriber.model_path.clone());
    let transcriber = voicerelay::stt::WhisperTranscriber::new(&path)?;
    Ok(Arc::new(transcriber))
}

#[cfg(not(feature = "whisper"))]
fn load_transcriber(
    _cfg: &Config,
    _model: Option<PathBuf>,
) -> Result<Arc<dyn voicerelay::Transcriber>> {
    anyhow::bail!("Built without the whisper feature; no transcriber available")
}
