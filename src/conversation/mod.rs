//! Conversation state and turn orchestration

mod controller;
mod transcript;

pub use controller::{
    ConversationController, ConversationEvent, DropReason, Services, TurnOutcome, TurnState,
};
pub use transcript::{ChatMessage, ChatTranscriptStore, Role};
