//! History store trait: persistent conversation turns and sessions.
//!
//! The engine reads recent turns before building a prompt and writes the
//! normalized response back afterwards. Failures here are surfaced to the
//! caller rather than swallowed.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::message::{
    ConversationTurn, HistoryStats, NewSession, Session, StatsRange, StoredTurn,
};

/// The core HistoryStore trait.
///
/// Implementations: SQLite, in-memory (for testing and ephemeral runs).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// The `limit` most recent turns of a session, oldest first.
    async fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<ConversationTurn>, MemoryError> {
        Ok(self
            .session_messages(session_id, limit)
            .await?
            .iter()
            .map(StoredTurn::turn)
            .collect())
    }

    /// The `limit` most recent rows of a session, oldest first.
    async fn session_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> std::result::Result<Vec<StoredTurn>, MemoryError>;

    /// Persist one exchange. The session is created if it does not exist.
    async fn append_turn(&self, turn: StoredTurn) -> std::result::Result<(), MemoryError>;

    /// Bump the session's last-activity timestamp.
    async fn touch_session(&self, session_id: &str) -> std::result::Result<(), MemoryError>;

    /// Create a new session.
    async fn create_session(&self, session: NewSession)
    -> std::result::Result<Session, MemoryError>;

    /// Get a session with its recent messages.
    async fn get_session(&self, session_id: &str)
    -> std::result::Result<Option<Session>, MemoryError>;

    /// Counts, top questions and per-day volume within `range`.
    async fn stats(&self, range: StatsRange) -> std::result::Result<HistoryStats, MemoryError>;
}
