//! Error types for the Folio domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// A failure talking to the generation backend.
///
/// Every variant is a backend error from the caller's point of view: the
/// response normalizer turns any of them into a fallback answer.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend timed out: {0}")]
    Timeout(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Backend request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl GenerationError {
    /// Short machine-friendly label for logs and the `error` field of a
    /// normalized response.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Api { .. } => "api_error",
            Self::StreamInterrupted(_) => "stream_interrupted",
        }
    }
}

/// A single line of a streamed response could not be decoded.
///
/// Non-fatal: the decoder logs it and moves on to the next line.
#[derive(Debug, Clone, Error)]
#[error("Failed to decode stream line {line:?}: {reason}")]
pub struct DecodeError {
    pub line: String,
    pub reason: String,
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

/// Malformed caller input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message must not be empty")]
    EmptyMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_displays_correctly() {
        let err = GenerationError::Api {
            status_code: 503,
            message: "model is loading".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model is loading"));
    }

    #[test]
    fn generation_error_kinds() {
        assert_eq!(GenerationError::Timeout("30s".into()).kind(), "timeout");
        assert_eq!(
            GenerationError::MalformedResponse("no response".into()).kind(),
            "malformed_response"
        );
        assert_eq!(
            GenerationError::Unavailable("refused".into()).kind(),
            "unavailable"
        );
    }

    #[test]
    fn decode_error_mentions_line() {
        let err = DecodeError {
            line: "garbage".into(),
            reason: "expected value".into(),
        };
        assert!(err.to_string().contains("garbage"));
    }

    #[test]
    fn memory_error_displays_cause() {
        let err = MemoryError::SessionNotFound("session_42".into());
        assert_eq!(err.to_string(), "Session not found: session_42");
        assert!(MemoryError::QueryFailed("disk I/O".into())
            .to_string()
            .contains("disk I/O"));
    }
}
