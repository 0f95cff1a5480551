//! Voice Agent - voice and text chat client for workflow-driven assistants
//!
//! A turn takes typed text or a microphone recording, transcribes audio via
//! the STT endpoint, relays the text to a workflow webhook, and speaks the
//! reply through the TTS endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Chat REPL / one-shot CLI              │
//! └──────────────────────────┬───────────────────────────┘
//!                            │
//! ┌──────────────────────────▼───────────────────────────┐
//! │               ConversationController                  │
//! │  Capture  │  STT  │  Workflow  │  TTS  │  Playback   │
//! └──────────────────────────┬───────────────────────────┘
//!                            │  routing table
//! ┌──────────────────────────▼───────────────────────────┐
//! │   Backend (/api/stt, /api/tts)  │  n8n (/webhook/…)  │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod conversation;
pub mod error;
mod http;
pub mod proxy;
pub mod routes;
pub mod transcript_log;
pub mod voice;
pub mod workflow;

pub use config::Config;
pub use conversation::{
    ChatMessage, ChatTranscriptStore, ConversationController, ConversationEvent, DropReason, Role,
    Services, TurnOutcome, TurnState,
};
pub use error::{Error, Result, Stage};
pub use proxy::ProxyServer;
pub use routes::{Endpoints, Route, RouteTable, Upstream};
pub use transcript_log::TranscriptLog;
pub use workflow::{HttpWorkflow, Workflow, WorkflowReply};
