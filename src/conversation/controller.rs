//! Turn-taking controller
//!
//! Drives one conversational turn end-to-end: optional STT, the workflow
//! call, the assistant message, TTS and playback. At most one turn runs at a
//! time; a submission made while a turn is in flight is dropped.
//!
//! The controller is meant for a single-threaded event loop. Its state lives
//! in `Cell`/`RefCell` and is never borrowed across an await point.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::transcript::{ChatMessage, ChatTranscriptStore, Role};
use crate::routes::Endpoints;
use crate::transcript_log::TranscriptLog;
use crate::voice::{
    AudioBlob, AudioSink, HttpSpeechToText, HttpTextToSpeech, SpeechToText, TextToSpeech,
};
use crate::workflow::{HttpWorkflow, Workflow};
use crate::{Error, Stage};

/// Remote services and playback a turn is made of
#[derive(Clone)]
pub struct Services {
    pub stt: Arc<dyn SpeechToText>,
    pub workflow: Arc<dyn Workflow>,
    pub tts: Arc<dyn TextToSpeech>,
    pub playback: Arc<dyn AudioSink>,
}

impl Services {
    /// HTTP clients for `endpoints` sharing one connection pool
    #[must_use]
    pub fn http(endpoints: &Endpoints, playback: Arc<dyn AudioSink>) -> Self {
        let client = reqwest::Client::new();
        Self {
            stt: Arc::new(HttpSpeechToText::new(client.clone(), endpoints.stt.clone())),
            workflow: Arc::new(HttpWorkflow::new(client.clone(), endpoints.workflow.clone())),
            tts: Arc::new(HttpTextToSpeech::new(
                client,
                endpoints.tts.clone(),
                endpoints.tts_text.clone(),
            )),
            playback,
        }
    }
}

/// Whether a turn is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    InFlight,
}

/// Notification for whatever renders the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    /// A message was added to the transcript
    MessageAppended(ChatMessage),
    /// STT produced a transcript
    Transcribed(String),
    /// A turn failed; the string is the user-visible error
    Failed(String),
    /// A turn started (`true`) or finished (`false`)
    Busy(bool),
}

/// Why a submission was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Input was empty after trimming
    EmptyInput,
    /// Another turn was in flight
    Busy,
}

/// How a submitted turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing happened
    Dropped(DropReason),
    /// STT heard nothing
    NoSpeech,
    /// Reply delivered and spoken
    Completed { reply: String },
    /// A stage failed; `message` is what the user sees
    Failed {
        stage: Option<Stage>,
        message: String,
    },
}

/// Returns the controller to idle when the turn ends, however it ends
struct TurnGuard<'a> {
    controller: &'a ConversationController,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.controller.state.set(TurnState::Idle);
        self.controller.emit(ConversationEvent::Busy(false));
    }
}

/// Orchestrates conversational turns and owns the transcript
pub struct ConversationController {
    services: Services,
    transcript: RefCell<ChatTranscriptStore>,
    state: Cell<TurnState>,
    last_transcript: RefCell<Option<String>>,
    last_error: RefCell<Option<String>>,
    events: Option<mpsc::UnboundedSender<ConversationEvent>>,
    transcript_log: Option<TranscriptLog>,
}

impl ConversationController {
    /// Create an idle controller with an empty transcript
    #[must_use]
    pub fn new(services: Services) -> Self {
        Self {
            services,
            transcript: RefCell::new(ChatTranscriptStore::new()),
            state: Cell::new(TurnState::Idle),
            last_transcript: RefCell::new(None),
            last_error: RefCell::new(None),
            events: None,
            transcript_log: None,
        }
    }

    /// Publish conversation events on `sender`
    #[must_use]
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<ConversationEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Append every STT transcript to `log`
    #[must_use]
    pub fn with_transcript_log(mut self, log: TranscriptLog) -> Self {
        self.transcript_log = Some(log);
        self
    }

    #[must_use]
    pub fn state(&self) -> TurnState {
        self.state.get()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.get() == TurnState::InFlight
    }

    /// Snapshot of the transcript
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.transcript.borrow().messages().to_vec()
    }

    #[must_use]
    pub fn transcript_len(&self) -> usize {
        self.transcript.borrow().len()
    }

    /// Most recent non-empty STT transcript
    #[must_use]
    pub fn last_transcript(&self) -> Option<String> {
        self.last_transcript.borrow().clone()
    }

    /// User-visible error of the most recent failed turn
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Submit typed text as a turn
    ///
    /// The in-flight check and the user message happen when this is called,
    /// before the returned future is first polled. Empty input or a busy
    /// controller yields [`TurnOutcome::Dropped`].
    pub fn submit_text(&self, text: &str) -> impl Future<Output = TurnOutcome> {
        let text = text.trim().to_string();
        let accepted = if text.is_empty() {
            Err(DropReason::EmptyInput)
        } else {
            self.begin_turn().ok_or(DropReason::Busy).map(|turn| {
                self.append(Role::User, &text);
                turn
            })
        };

        async move {
            match accepted {
                Ok(_turn) => self.reply_to(&text).await,
                Err(reason) => self.dropped(reason),
            }
        }
    }

    /// Submit a recording as a turn
    ///
    /// The turn holds the controller from transcription through playback. An
    /// empty transcript ends the turn quietly with [`TurnOutcome::NoSpeech`].
    pub fn submit_audio(&self, audio: AudioBlob) -> impl Future<Output = TurnOutcome> {
        let accepted = self.begin_turn().ok_or(DropReason::Busy);

        async move {
            let _turn = match accepted {
                Ok(turn) => turn,
                Err(reason) => return self.dropped(reason),
            };

            let transcript = match self.services.stt.transcribe(&audio).await {
                Ok(text) => text.trim().to_string(),
                Err(e) => return self.fail(e),
            };

            if transcript.is_empty() {
                tracing::info!("no speech detected");
                return TurnOutcome::NoSpeech;
            }

            self.record_transcript(&transcript);
            self.append(Role::User, &transcript);
            self.reply_to(&transcript).await
        }
    }

    /// Workflow, assistant message, TTS, playback
    async fn reply_to(&self, text: &str) -> TurnOutcome {
        let reply = match self.services.workflow.send(text).await {
            Ok(reply) => reply.into_text(),
            Err(e) => return self.fail(e),
        };

        self.append(Role::Assistant, &reply);

        let audio = match self.services.tts.synthesize(&reply).await {
            Ok(audio) => audio,
            Err(e) => return self.fail(e),
        };

        if let Err(e) = self.services.playback.play(audio).await {
            return self.fail(e);
        }

        tracing::info!(reply_chars = reply.len(), "turn complete");
        TurnOutcome::Completed { reply }
    }

    fn begin_turn(&self) -> Option<TurnGuard<'_>> {
        if self.is_busy() {
            return None;
        }

        self.state.set(TurnState::InFlight);
        *self.last_error.borrow_mut() = None;
        self.emit(ConversationEvent::Busy(true));
        Some(TurnGuard { controller: self })
    }

    fn dropped(&self, reason: DropReason) -> TurnOutcome {
        tracing::debug!(?reason, state = ?self.state(), "submission dropped");
        TurnOutcome::Dropped(reason)
    }

    fn append(&self, role: Role, text: &str) {
        let message = self.transcript.borrow_mut().append(role, text);
        self.emit(ConversationEvent::MessageAppended(message));
    }

    fn record_transcript(&self, transcript: &str) {
        *self.last_transcript.borrow_mut() = Some(transcript.to_string());
        self.emit(ConversationEvent::Transcribed(transcript.to_string()));

        let Some(log) = &self.transcript_log else {
            return;
        };
        if let Err(e) = log.append(transcript) {
            tracing::warn!(path = %log.path().display(), error = %e, "failed to log transcript");
        }
    }

    fn fail(&self, err: Error) -> TurnOutcome {
        let message = err.to_string();
        tracing::error!(stage = ?err.stage(), error = %message, "turn failed");

        *self.last_error.borrow_mut() = Some(message.clone());
        self.emit(ConversationEvent::Failed(message.clone()));
        TurnOutcome::Failed {
            stage: err.stage(),
            message,
        }
    }

    fn emit(&self, event: ConversationEvent) {
        if let Some(events) = &self.events {
            // Nobody listening is fine
            let _ = events.send(event);
        }
    }
}
