//! Reply-shape normalization for workflow responses
//!
//! The workflow engine may answer with a bare JSON string, an object with a
//! `response` or `output` field, or plain text. `response` takes precedence
//! over `output`; whatever is missing resolves to the empty string.

use serde_json::Value;

/// A workflow reply as received, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowReply {
    /// Body was a JSON string
    Text(String),
    /// Body was a JSON value other than a string or `null`
    Object {
        response: Option<String>,
        output: Option<String>,
    },
    /// Body was not JSON (or was `null`); the raw text is the reply
    Raw(String),
}

impl WorkflowReply {
    /// Classify a raw response body
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::String(text)) => Self::Text(text),
            Ok(Value::Object(map)) => Self::Object {
                response: map.get("response").and_then(field_text),
                output: map.get("output").and_then(field_text),
            },
            // `null` has no fields to read; fall back to the raw body
            Ok(Value::Null) | Err(_) => Self::Raw(raw.to_string()),
            Ok(_) => Self::Object {
                response: None,
                output: None,
            },
        }
    }

    /// Reply text, never absent
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) | Self::Raw(text) => text,
            Self::Object { response, output } => response.or(output).unwrap_or_default(),
        }
    }
}

/// Text of a reply field; `null` counts as absent
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
