//! Shared test utilities
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::{Notify, mpsc};
use voice_agent::voice::{
    AudioBlob, AudioSink, AudioSource, ChunkEncoding, InputTracks, OpenInput, SpeechToText,
    TextToSpeech,
};
use voice_agent::{Error, Result, Services, Stage, Workflow, WorkflowReply};

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_upstream(router: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let addr = listener.local_addr().expect("no local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });
    format!("http://{addr}")
}

/// Base URL on which nothing is listening
pub async fn closed_origin() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test port");
    let addr = listener.local_addr().expect("no local addr");
    drop(listener);
    format!("http://{addr}")
}

fn failure(stage: Stage, status: u16) -> Error {
    Error::RequestFailed {
        stage,
        status,
        body: String::new(),
    }
}

/// Scripted STT: fixed transcript or a failing status
#[derive(Default)]
pub struct FakeStt {
    pub transcript: String,
    pub fail_status: Option<u16>,
    pub received: Mutex<Vec<AudioBlob>>,
}

impl FakeStt {
    pub fn hearing(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            ..Self::default()
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechToText for FakeStt {
    async fn transcribe(&self, audio: &AudioBlob) -> Result<String> {
        self.received.lock().unwrap().push(audio.clone());
        match self.fail_status {
            Some(status) => Err(failure(Stage::Stt, status)),
            None => Ok(self.transcript.clone()),
        }
    }
}

/// Scripted workflow, optionally held until a gate opens
#[derive(Default)]
pub struct FakeWorkflow {
    pub reply: Option<WorkflowReply>,
    pub fail_status: Option<u16>,
    pub gate: Option<Arc<Notify>>,
    pub received: Mutex<Vec<String>>,
}

impl FakeWorkflow {
    pub fn replying(reply: WorkflowReply) -> Self {
        Self {
            reply: Some(reply),
            ..Self::default()
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }

    pub fn gated(reply: WorkflowReply, gate: Arc<Notify>) -> Self {
        Self {
            reply: Some(reply),
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Workflow for FakeWorkflow {
    async fn send(&self, message: &str) -> Result<WorkflowReply> {
        self.received.lock().unwrap().push(message.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.fail_status {
            Some(status) => Err(failure(Stage::Workflow, status)),
            None => Ok(self
                .reply
                .clone()
                .unwrap_or_else(|| WorkflowReply::Text(String::new()))),
        }
    }
}

/// Scripted TTS returning fixed audio bytes
#[derive(Default)]
pub struct FakeTts {
    pub fail_status: Option<u16>,
    pub received: Mutex<Vec<String>>,
}

impl FakeTts {
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextToSpeech for FakeTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.received.lock().unwrap().push(text.to_string());
        match self.fail_status {
            Some(status) => Err(failure(Stage::Tts, status)),
            None => Ok(format!("audio:{text}").into_bytes()),
        }
    }
}

/// Records what it was asked to play
#[derive(Default)]
pub struct RecordingSink {
    pub fail: bool,
    pub played: Mutex<Vec<Vec<u8>>>,
}

impl RecordingSink {
    pub fn plays(&self) -> usize {
        self.played.lock().unwrap().len()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, audio: Vec<u8>) -> Result<()> {
        if self.fail {
            return Err(Error::Audio("output device went away".to_string()));
        }
        self.played.lock().unwrap().push(audio);
        Ok(())
    }
}

/// Fakes wired into a controller, kept for inspection
pub struct Fakes {
    pub stt: Arc<FakeStt>,
    pub workflow: Arc<FakeWorkflow>,
    pub tts: Arc<FakeTts>,
    pub playback: Arc<RecordingSink>,
}

impl Fakes {
    pub fn new(stt: FakeStt, workflow: FakeWorkflow) -> Self {
        Self {
            stt: Arc::new(stt),
            workflow: Arc::new(workflow),
            tts: Arc::new(FakeTts::default()),
            playback: Arc::new(RecordingSink::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            stt: self.stt.clone(),
            workflow: self.workflow.clone(),
            tts: self.tts.clone(),
            playback: self.playback.clone(),
        }
    }
}

/// Input tracks that count how often they are stopped
pub struct CountingTracks {
    stops: Arc<AtomicUsize>,
}

impl InputTracks for CountingTracks {
    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Microphone stand-in fed by the test through `sender`
pub struct FakeSource {
    pub encoding: ChunkEncoding,
    pub deny: bool,
    pub stops: Arc<AtomicUsize>,
    pub opens: usize,
    pub sender: Arc<Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl FakeSource {
    pub fn new(encoding: ChunkEncoding) -> Self {
        Self {
            encoding,
            deny: false,
            stops: Arc::new(AtomicUsize::new(0)),
            opens: 0,
            sender: Arc::new(Mutex::new(None)),
        }
    }

    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new(ChunkEncoding::Container { mime_type: None })
        }
    }
}

impl AudioSource for FakeSource {
    fn open(&mut self) -> Result<OpenInput> {
        if self.deny {
            return Err(Error::Audio("NotAllowedError".to_string()));
        }
        self.opens += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock().unwrap() = Some(tx);

        Ok(OpenInput {
            chunks: rx,
            tracks: Box::new(CountingTracks {
                stops: self.stops.clone(),
            }),
            encoding: self.encoding.clone(),
        })
    }
}

/// Push a chunk into the currently open fake microphone
pub fn feed(sender: &Arc<Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>>, chunk: &[u8]) {
    sender
        .lock()
        .unwrap()
        .as_ref()
        .expect("microphone not open")
        .send(chunk.to_vec())
        .expect("recording already finalized");
}
