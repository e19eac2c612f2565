use base64::Engine;
use voicerelay::wire::{bytes_to_samples, samples_to_bytes, AudioChunkMessage, TranscriptMessage};

#[test]
fn test_audio_chunk_serialization() {
    let msg = AudioChunkMessage::new("session-abc", 0, &[0u8; 100], 16000);

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("session-abc"));
    assert!(json.contains("16000"));
    assert!(json.contains("\"final\":false"));
    assert!(json.contains("\"sequence\":0"));

    let deserialized: AudioChunkMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.session_id, "session-abc");
    assert_eq!(deserialized.sample_rate, 16000);
    assert_eq!(deserialized.sequence, 0);
    assert!(!deserialized.final_chunk);
    assert_eq!(deserialized.payload().unwrap(), vec![0u8; 100]);
}

#[test]
fn test_final_marker() {
    let msg = AudioChunkMessage::final_marker("session-abc", 10, 16000);

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"final\":true"));

    let deserialized: AudioChunkMessage = serde_json::from_str(&json).unwrap();
    assert!(deserialized.final_chunk);
    assert!(deserialized.pcm.is_empty());
    assert_eq!(deserialized.sequence, 10);
}

#[test]
fn test_transcript_deserialization() {
    let json = r#"{
        "session_id": "session-abc",
        "text": "Hello world",
        "timestamp": "2026-08-25T14:30:05Z"
    }"#;

    let msg: TranscriptMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.session_id, "session-abc");
    assert_eq!(msg.text, "Hello world");
    assert_eq!(msg.timestamp, "2026-08-25T14:30:05Z");
}

#[test]
fn test_pcm_encoding_roundtrip() {
    let original_samples: Vec<i16> = vec![100, -200, 300, -400];

    let pcm_bytes = samples_to_bytes(&original_samples);
    let encoded = base64::engine::general_purpose::STANDARD.encode(&pcm_bytes);

    let msg = AudioChunkMessage {
        session_id: "session-abc".to_string(),
        sequence: 0,
        pcm: encoded,
        sample_rate: 16000,
        timestamp: "2026-08-25T14:30:00Z".to_string(),
        final_chunk: false,
    };

    let decoded = msg.payload().unwrap();
    assert_eq!(decoded, pcm_bytes);
    assert_eq!(bytes_to_samples(&decoded), original_samples);
}

#[test]
fn test_samples_to_bytes_is_little_endian() {
    let bytes = samples_to_bytes(&[0x0102, -1]);
    assert_eq!(bytes, vec![0x02, 0x01, 0xFF, 0xFF]);
}
