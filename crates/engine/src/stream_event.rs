//! Engine-level streaming events.
//!
//! `ChatStreamEvent` wraps backend text deltas into the events a streaming
//! caller (terminal, socket, SSE layer) consumes:
//! - `chunk`: partial text from the backend
//! - `fallback`: the backend could not be reached; a canned answer instead
//! - `error`: the stream broke mid-way; no more chunks follow
//! - `done`: always last, with correlation metadata

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// Partial text from the backend.
    Chunk { content: String },

    /// Fallback answer used when the stream could not be opened.
    Fallback { content: String, error: String },

    /// The stream was interrupted mid-way.
    Error { message: String },

    /// The stream is complete.
    Done {
        message_id: String,
        session_id: String,
        model: String,
        success: bool,
    },
}

impl ChatStreamEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Fallback { .. } => "fallback",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }
}

/// The event sequence returned by `ContextEngine::chat_stream`.
pub type ChatStream = Pin<Box<dyn Stream<Item = ChatStreamEvent> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_chunk() {
        let event = ChatStreamEvent::Chunk {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn event_serialization_done() {
        let event = ChatStreamEvent::Done {
            message_id: "msg_1".into(),
            session_id: "s1".into(),
            model: "llama3.1".into(),
            success: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""success":true"#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            ChatStreamEvent::Fallback {
                content: "x".into(),
                error: "y".into()
            }
            .event_type(),
            "fallback"
        );
        assert_eq!(
            ChatStreamEvent::Error {
                message: "x".into()
            }
            .event_type(),
            "error"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"chunk","content":"hi"}"#;
        let event: ChatStreamEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ChatStreamEvent::Chunk {
                content: "hi".into()
            }
        );
    }
}
