//! Error types for the voice agent

use std::fmt;

use thiserror::Error;

/// Result type alias for voice agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Step of a conversational turn, used to say where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Speech-to-text request
    Stt,
    /// Workflow webhook request
    Workflow,
    /// Text-to-speech request
    Tts,
    /// Local audio playback
    Playback,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stt => "STT",
            Self::Workflow => "workflow",
            Self::Tts => "TTS",
            Self::Playback => "playback",
        })
    }
}

/// Errors that can occur in the voice agent
///
/// The `Display` text of every variant is what the user gets to see.
#[derive(Debug, Error)]
pub enum Error {
    /// Microphone access refused or no input device
    #[error("microphone permission denied or unavailable: {0}")]
    PermissionDenied(String),

    /// Remote endpoint answered with a non-2xx status
    #[error("{stage} request failed ({status}){}", body_suffix(.body))]
    RequestFailed {
        stage: Stage,
        status: u16,
        body: String,
    },

    /// Request never produced a response
    #[error("{stage} request could not be completed: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: reqwest::Error,
    },

    /// Response body did not have the expected shape
    #[error("{stage} response could not be decoded: {message}")]
    Decode { stage: Stage, message: String },

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Proxy server error
    #[error("server error: {0}")]
    Server(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Stage of the turn this error belongs to, if any
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::RequestFailed { stage, .. }
            | Self::Transport { stage, .. }
            | Self::Decode { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// HTTP status carried by the error, if any
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn body_suffix(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}
