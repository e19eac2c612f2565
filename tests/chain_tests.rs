// End-to-end tests for the three-hop relay chain.
//
// Each test spins up a real terminal and relay hop on ephemeral ports and
// drives a capture session against them with fake collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::SinkExt;
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;

use voicerelay::wire::{self, AudioChunkMessage};
use voicerelay::{originator, relay, terminal, AudioSource, RelayError, Result, Transcriber};

const SAMPLE_RATE: u32 = 16000;
const TEST_DEADLINE: Duration = Duration::from_secs(10);

/// Plays back a fixed script of chunks, then fails if polled again.
struct ScriptedSource {
    chunks: Vec<Vec<i16>>,
    index: usize,
}

impl ScriptedSource {
    fn new(chunks: Vec<Vec<i16>>) -> Self {
        Self { chunks, index: 0 }
    }

    /// Window that covers exactly the scripted samples.
    fn window(&self) -> Duration {
        let total: usize = self.chunks.iter().map(|c| c.len()).sum();
        Duration::from_secs_f64(total as f64 / SAMPLE_RATE as f64)
    }
}

#[async_trait]
impl AudioSource for ScriptedSource {
    async fn next_chunk(&mut self) -> Result<Vec<i16>> {
        let chunk = self
            .chunks
            .get(self.index)
            .cloned()
            .ok_or_else(|| RelayError::Microphone("script exhausted".to_string()))?;
        self.index += 1;
        Ok(chunk)
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Records every invocation and answers with the buffer length.
#[derive(Clone, Default)]
struct RecordingTranscriber {
    calls: Arc<Mutex<Vec<(Vec<u8>, u32)>>>,
}

impl Transcriber for RecordingTranscriber {
    fn transcribe(&self, pcm: &[u8], sample_rate: u32) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((pcm.to_vec(), sample_rate));
        Ok(format!("{} bytes", pcm.len()))
    }
}

/// Reports its backing model as missing on every call.
struct MissingModelTranscriber;

impl Transcriber for MissingModelTranscriber {
    fn transcribe(&self, _pcm: &[u8], _sample_rate: u32) -> Result<String> {
        Err(RelayError::ModelUnavailable("ggml-base.en.bin".to_string()))
    }
}

/// Start a terminal and a relay hop on ephemeral ports; returns the relay URL.
async fn start_chain(transcriber: Arc<dyn Transcriber>) -> String {
    let terminal_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let terminal_addr = terminal_listener.local_addr().unwrap();
    tokio::spawn(terminal::serve(
        terminal_listener,
        transcriber,
        Duration::from_secs(5),
    ));

    let relay_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = relay_listener.local_addr().unwrap();
    tokio::spawn(relay::serve(relay_listener, format!("ws://{terminal_addr}")));

    format!("ws://{relay_addr}")
}

fn patterned_chunk(seed: i16, len: usize) -> Vec<i16> {
    (0..len).map(|i| seed.wrapping_add(i as i16)).collect()
}

#[tokio::test]
async fn chunks_arrive_concatenated_in_order() {
    let transcriber = RecordingTranscriber::default();
    let relay_url = start_chain(Arc::new(transcriber.clone())).await;

    let chunks = vec![
        patterned_chunk(1, 1024),
        patterned_chunk(1000, 1024),
        patterned_chunk(-2000, 1024),
    ];
    let expected: Vec<u8> = chunks
        .iter()
        .flat_map(|c| wire::samples_to_bytes(c))
        .collect();

    let mut source = ScriptedSource::new(chunks);
    let window = source.window();
    let outcome = tokio::time::timeout(
        TEST_DEADLINE,
        originator::run_session(&relay_url, window, &mut source),
    )
    .await
    .expect("session hung")
    .unwrap();

    // exactly one transcript, correlated to this session
    assert_eq!(outcome.transcripts.len(), 1);
    assert!(outcome.session_id.starts_with("session-"));
    assert_eq!(outcome.transcripts[0].session_id, outcome.session_id);
    assert_eq!(outcome.transcripts[0].text, format!("{} bytes", expected.len()));

    // the terminal saw the exact ordered concatenation, once
    let calls = transcriber.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, expected);
    assert_eq!(calls[0].1, SAMPLE_RATE);
}

#[tokio::test]
async fn chunk_boundaries_are_not_semantic() {
    let transcriber = RecordingTranscriber::default();
    let relay_url = start_chain(Arc::new(transcriber.clone())).await;

    let samples = patterned_chunk(42, 3072);

    // same bytes, two different chunkings
    for split in [1024usize, 512] {
        let chunks: Vec<Vec<i16>> = samples.chunks(split).map(|c| c.to_vec()).collect();
        let mut source = ScriptedSource::new(chunks);
        let window = source.window();
        tokio::time::timeout(
            TEST_DEADLINE,
            originator::run_session(&relay_url, window, &mut source),
        )
        .await
        .expect("session hung")
        .unwrap();
    }

    let calls = transcriber.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, calls[1].0);
    assert_eq!(calls[0].0, wire::samples_to_bytes(&samples));
}

#[tokio::test]
async fn zero_chunk_session_still_transcribes() {
    let transcriber = RecordingTranscriber::default();
    let relay_url = start_chain(Arc::new(transcriber.clone())).await;

    let mut source = ScriptedSource::new(vec![]);
    let outcome = tokio::time::timeout(
        TEST_DEADLINE,
        originator::run_session(&relay_url, Duration::ZERO, &mut source),
    )
    .await
    .expect("session hung")
    .unwrap();

    // the collaborator still runs on an empty buffer, and its (empty)
    // result still comes back as exactly one transcript
    assert_eq!(outcome.transcripts.len(), 1);
    assert_eq!(outcome.transcripts[0].text, "0 bytes");
    assert_eq!(outcome.transcripts[0].session_id, outcome.session_id);

    let calls = transcriber.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].0.is_empty());
}

#[tokio::test]
async fn missing_model_fails_without_transcript() {
    let relay_url = start_chain(Arc::new(MissingModelTranscriber)).await;

    let mut source = ScriptedSource::new(vec![patterned_chunk(7, 1024)]);
    let window = source.window();
    let result = tokio::time::timeout(
        TEST_DEADLINE,
        originator::run_session(&relay_url, window, &mut source),
    )
    .await
    .expect("receive loop hung");

    // No transcript is ever produced; the originator terminates either
    // with an empty drain or a surfaced transport failure.
    if let Ok(outcome) = result {
        assert!(outcome.transcripts.is_empty());
    }
}

#[tokio::test]
async fn dead_inbound_stream_releases_the_session() {
    let transcriber = RecordingTranscriber::default();
    let relay_url = start_chain(Arc::new(transcriber.clone())).await;

    // Open a session, send one chunk, then drop the socket without any
    // close handshake: the relay's inbound receive fails mid-session.
    {
        let (mut ws, _) = connect_async(&relay_url).await.unwrap();
        let chunk = AudioChunkMessage::new(
            "session-dead",
            0,
            &wire::samples_to_bytes(&patterned_chunk(3, 64)),
            SAMPLE_RATE,
        );
        ws.send(wire::encode(&chunk).unwrap()).await.unwrap();
        // dropped here, no close frame
    }

    // The failure must cancel the backward direction instead of leaving
    // it waiting forever, and the aborted stream must not be transcribed.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(transcriber.calls.lock().unwrap().is_empty());

    // The chain stays healthy for the next session.
    let mut source = ScriptedSource::new(vec![patterned_chunk(9, 1024)]);
    let window = source.window();
    let outcome = tokio::time::timeout(
        TEST_DEADLINE,
        originator::run_session(&relay_url, window, &mut source),
    )
    .await
    .expect("session hung")
    .unwrap();

    assert_eq!(outcome.transcripts.len(), 1);
    assert_eq!(outcome.transcripts[0].text, "2048 bytes");
}
