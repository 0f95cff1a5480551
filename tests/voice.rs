//! Voice pipeline integration tests
//!
//! Tests capture without audio hardware and the STT/TTS/workflow clients
//! against local mock endpoints

use std::io::Cursor;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Bytes,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use serde_json::{Value, json};
use voice_agent::voice::{
    AudioBlob, AudioCapture, ChunkEncoding, HttpSpeechToText, HttpTextToSpeech, SAMPLE_RATE,
    SpeechToText, TextToSpeech, UPLOAD_FILE_NAME, decode_audio, samples_to_wav,
};
use voice_agent::{Error, HttpWorkflow, Stage, Workflow, WorkflowReply};

mod common;
use common::{FakeSource, closed_origin, feed, spawn_upstream};

/// Generate sine wave audio samples
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn pcm_source() -> FakeSource {
    FakeSource::new(ChunkEncoding::Pcm16 {
        sample_rate: SAMPLE_RATE,
        channels: 1,
    })
}

// Capture

#[test]
fn test_capture_pcm_chunks_finalize_to_wav() {
    let source = pcm_source();
    let sender = source.sender.clone();
    let stops = source.stops.clone();
    let mut capture = AudioCapture::new(source);

    capture.start().unwrap();
    assert!(capture.is_recording());

    feed(&sender, &pcm_bytes(&[0, 100, -100]));
    assert_eq!(capture.poll_chunks(), 6);
    feed(&sender, &pcm_bytes(&[i16::MAX, i16::MIN]));

    let blob = capture.stop().unwrap().unwrap();
    assert!(!capture.is_recording());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert_eq!(blob.mime_type.as_deref(), Some("audio/wav"));

    let mut reader = hound::WavReader::new(Cursor::new(blob.bytes)).unwrap();
    assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 1);
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples, vec![0, 100, -100, i16::MAX, i16::MIN]);
}

#[test]
fn test_capture_container_chunks_keep_mime_type() {
    let source = FakeSource::new(ChunkEncoding::Container {
        mime_type: Some("audio/webm;codecs=opus".to_string()),
    });
    let sender = source.sender.clone();
    let mut capture = AudioCapture::new(source);

    capture.start().unwrap();
    feed(&sender, b"head");
    feed(&sender, b"");
    feed(&sender, b"tail");

    let blob = capture.stop().unwrap().unwrap();
    assert_eq!(blob.bytes, b"headtail");
    assert_eq!(blob.mime_type.as_deref(), Some("audio/webm;codecs=opus"));
}

#[test]
fn test_capture_without_negotiated_type_is_untyped() {
    let source = FakeSource::new(ChunkEncoding::Container { mime_type: None });
    let sender = source.sender.clone();
    let mut capture = AudioCapture::new(source);

    capture.start().unwrap();
    feed(&sender, b"data");

    let blob = capture.stop().unwrap().unwrap();
    assert_eq!(blob, AudioBlob::new(b"data".to_vec(), None));
}

#[test]
fn test_stop_twice_is_noop() {
    let source = pcm_source();
    let stops = source.stops.clone();
    let mut capture = AudioCapture::new(source);

    capture.start().unwrap();
    assert!(capture.stop().unwrap().is_some());
    assert!(capture.stop().unwrap().is_none());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stop_while_idle_is_noop() {
    let mut capture = AudioCapture::new(pcm_source());
    assert!(capture.stop().unwrap().is_none());
    assert!(!capture.is_recording());
}

#[test]
fn test_empty_recording_gives_empty_blob() {
    let source = FakeSource::new(ChunkEncoding::Container { mime_type: None });
    let mut capture = AudioCapture::new(source);

    capture.start().unwrap();
    let blob = capture.stop().unwrap().unwrap();
    assert!(blob.is_empty());
}

#[test]
fn test_start_while_recording_keeps_session() {
    let source = pcm_source();
    let sender = source.sender.clone();
    let mut capture = AudioCapture::new(source);

    capture.start().unwrap();
    feed(&sender, &pcm_bytes(&[1, 2]));
    capture.start().unwrap();
    feed(&sender, &pcm_bytes(&[3]));

    let blob = capture.stop().unwrap().unwrap();
    let mut reader = hound::WavReader::new(Cursor::new(blob.bytes)).unwrap();
    assert_eq!(reader.samples::<i16>().count(), 3);
}

#[test]
fn test_dropping_capture_releases_microphone_once() {
    let source = pcm_source();
    let sender = source.sender.clone();
    let stops = source.stops.clone();
    let mut capture = AudioCapture::new(source);

    capture.start().unwrap();
    feed(&sender, &pcm_bytes(&[1, 2, 3]));
    drop(capture);

    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dropping_idle_capture_stops_nothing() {
    let source = pcm_source();
    let stops = source.stops.clone();
    let mut capture = AudioCapture::new(source);

    capture.start().unwrap();
    capture.stop().unwrap();
    drop(capture);

    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_each_recording_releases_its_own_tracks() {
    let source = pcm_source();
    let stops = source.stops.clone();
    let mut capture = AudioCapture::new(source);

    for _ in 0..3 {
        capture.start().unwrap();
        capture.stop().unwrap();
    }

    assert_eq!(stops.load(Ordering::SeqCst), 3);
}

#[test]
fn test_permission_denied() {
    let mut capture = AudioCapture::new(FakeSource::denied());

    let err = capture.start().unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
    assert!(err.to_string().contains("NotAllowedError"));
    assert!(!capture.is_recording());
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    let decoded = decode_audio(&wav_data).unwrap();
    assert_eq!(decoded.sample_rate, SAMPLE_RATE);
    assert_eq!(decoded.samples.len(), samples.len());
}

// Remote clients

#[tokio::test]
async fn test_stt_uploads_multipart_file() {
    let seen: Arc<Mutex<Option<(String, String)>>> = Arc::new(Mutex::new(None));
    let captured = seen.clone();
    let origin = spawn_upstream(Router::new().route(
        "/api/stt",
        post(move |headers: HeaderMap, body: Bytes| async move {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            *captured.lock().unwrap() =
                Some((content_type, String::from_utf8_lossy(&body).to_string()));
            Json(json!({ "text": "hello world" }))
        }),
    ))
    .await;

    let stt = HttpSpeechToText::new(reqwest::Client::new(), format!("{origin}/api/stt"));
    let transcript = stt
        .transcribe(&AudioBlob::wav(b"RIFFfake".to_vec()))
        .await
        .unwrap();
    assert_eq!(transcript, "hello world");

    let (content_type, body) = seen.lock().unwrap().clone().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = body.to_ascii_lowercase();
    assert!(body.contains("name=\"file\""));
    assert!(body.contains(&format!("filename=\"{UPLOAD_FILE_NAME}\"")));
    assert!(body.contains("content-type: audio/wav"));
    assert!(body.contains("rifffake"));
}

#[tokio::test]
async fn test_stt_missing_text_is_empty() {
    let origin = spawn_upstream(
        Router::new().route("/api/stt", post(|| async { Json(json!({})) })),
    )
    .await;

    let stt = HttpSpeechToText::new(reqwest::Client::new(), format!("{origin}/api/stt"));
    let transcript = stt.transcribe(&AudioBlob::new(vec![1], None)).await.unwrap();
    assert_eq!(transcript, "");
}

#[tokio::test]
async fn test_stt_null_text_is_empty() {
    let origin = spawn_upstream(
        Router::new().route("/api/stt", post(|| async { Json(json!({ "text": null })) })),
    )
    .await;

    let stt = HttpSpeechToText::new(reqwest::Client::new(), format!("{origin}/api/stt"));
    let transcript = stt.transcribe(&AudioBlob::new(vec![1], None)).await.unwrap();
    assert_eq!(transcript, "");
}

#[tokio::test]
async fn test_stt_malformed_json_is_decode_error() {
    let origin = spawn_upstream(
        Router::new().route("/api/stt", post(|| async { "definitely not json" })),
    )
    .await;

    let stt = HttpSpeechToText::new(reqwest::Client::new(), format!("{origin}/api/stt"));
    let err = stt.transcribe(&AudioBlob::new(vec![1], None)).await.unwrap_err();
    assert!(matches!(err, Error::Decode { stage: Stage::Stt, .. }));
}

#[tokio::test]
async fn test_stt_error_status_carries_body() {
    let origin = spawn_upstream(Router::new().route(
        "/api/stt",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
    ))
    .await;

    let stt = HttpSpeechToText::new(reqwest::Client::new(), format!("{origin}/api/stt"));
    let err = stt.transcribe(&AudioBlob::new(vec![1], None)).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.stage(), Some(Stage::Stt));
    assert_eq!(err.to_string(), "STT request failed (500): model not loaded");
}

#[tokio::test]
async fn test_workflow_posts_message() {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = seen.clone();
    let origin = spawn_upstream(Router::new().route(
        "/webhook/my-webhook",
        post(move |Json(body): Json<Value>| async move {
            captured.lock().unwrap().push(body);
            Json(json!({ "output": "from output" }))
        }),
    ))
    .await;

    let workflow =
        HttpWorkflow::new(reqwest::Client::new(), format!("{origin}/webhook/my-webhook"));
    let reply = workflow.send("hi there").await.unwrap();

    assert_eq!(
        reply,
        WorkflowReply::Object {
            response: None,
            output: Some("from output".to_string())
        }
    );
    assert_eq!(seen.lock().unwrap()[0], json!({ "message": "hi there" }));
}

#[tokio::test]
async fn test_workflow_plain_text_reply() {
    let origin = spawn_upstream(
        Router::new().route("/webhook/my-webhook", post(|| async { "plain text" })),
    )
    .await;

    let workflow =
        HttpWorkflow::new(reqwest::Client::new(), format!("{origin}/webhook/my-webhook"));
    let reply = workflow.send("hi").await.unwrap();

    assert_eq!(reply, WorkflowReply::Raw("plain text".to_string()));
    assert_eq!(reply.into_text(), "plain text");
}

#[tokio::test]
async fn test_workflow_error_status() {
    let origin = spawn_upstream(Router::new().route(
        "/webhook/my-webhook",
        post(|| async { StatusCode::NOT_FOUND }),
    ))
    .await;

    let workflow =
        HttpWorkflow::new(reqwest::Client::new(), format!("{origin}/webhook/my-webhook"));
    let err = workflow.send("hi").await.unwrap_err();

    assert_eq!(err.to_string(), "workflow request failed (404)");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let origin = closed_origin().await;

    let workflow =
        HttpWorkflow::new(reqwest::Client::new(), format!("{origin}/webhook/my-webhook"));
    let err = workflow.send("hi").await.unwrap_err();

    assert!(matches!(
        err,
        Error::Transport {
            stage: Stage::Workflow,
            ..
        }
    ));
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_tts_returns_audio_bytes() {
    let wav = samples_to_wav(&generate_sine_samples(440.0, 0.05, 0.5), SAMPLE_RATE).unwrap();
    let served = wav.clone();
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = seen.clone();
    let origin = spawn_upstream(Router::new().route(
        "/api/tts",
        post(move |Json(body): Json<Value>| async move {
            captured.lock().unwrap().push(body);
            ([(header::CONTENT_TYPE, "audio/wav")], served)
        }),
    ))
    .await;

    let tts = HttpTextToSpeech::new(
        reqwest::Client::new(),
        format!("{origin}/api/tts"),
        format!("{origin}/api/tts-text"),
    );
    let audio = tts.synthesize("say this").await.unwrap();

    assert_eq!(audio, wav);
    assert_eq!(seen.lock().unwrap()[0], json!({ "text": "say this" }));
    assert!(decode_audio(&audio).is_ok());
}

#[tokio::test]
async fn test_tts_empty_body_is_decode_error() {
    let origin = spawn_upstream(
        Router::new().route("/api/tts", post(|| async { StatusCode::OK })),
    )
    .await;

    let tts = HttpTextToSpeech::new(
        reqwest::Client::new(),
        format!("{origin}/api/tts"),
        format!("{origin}/api/tts-text"),
    );
    let err = tts.synthesize("hello").await.unwrap_err();

    assert!(matches!(err, Error::Decode { stage: Stage::Tts, .. }));
}

#[tokio::test]
async fn test_tts_preset_text() {
    let origin = spawn_upstream(Router::new().route(
        "/api/tts-text",
        get(|| async { Json(json!({ "text": "Hello from the backend" })) }),
    ))
    .await;

    let tts = HttpTextToSpeech::new(
        reqwest::Client::new(),
        format!("{origin}/api/tts"),
        format!("{origin}/api/tts-text"),
    );

    assert_eq!(tts.preset_text().await.unwrap(), "Hello from the backend");
}
