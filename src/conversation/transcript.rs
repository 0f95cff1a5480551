//! Append-only chat transcript

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Who sent a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One exchanged message; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    id: Uuid,
    role: Role,
    text: String,
    created_at: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: Role, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Ordered log of chat messages
///
/// Messages are appended in chronological order and never mutated or
/// removed.
#[derive(Debug, Default)]
pub struct ChatTranscriptStore {
    messages: Vec<ChatMessage>,
}

impl ChatTranscriptStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Append a message and return a copy of it
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> ChatMessage {
        let mut message = ChatMessage::new(role, text.into());

        // Keep timestamps non-decreasing even if the wall clock steps back
        if let Some(last) = self
            .messages
            .last()
            .filter(|last| last.created_at > message.created_at)
        {
            message.created_at = last.created_at;
        }

        self.messages.push(message.clone());
        message
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_in_order_with_unique_ids() {
        let mut store = ChatTranscriptStore::new();
        let first = store.append(Role::User, "hi");
        let second = store.append(Role::Assistant, "hello");

        assert_eq!(store.len(), 2);
        assert_ne!(first.id(), second.id());
        assert!(first.created_at() <= second.created_at());
        assert_eq!(store.messages()[0].role(), Role::User);
        assert_eq!(store.last().map(ChatMessage::text), Some("hello"));
    }

    #[test]
    fn serializes_role_lowercase() {
        let mut store = ChatTranscriptStore::new();
        let message = store.append(Role::Assistant, "ok");
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["role"], "assistant");
        assert_eq!(json["text"], "ok");
    }
}
