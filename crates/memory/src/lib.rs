//! Conversation history stores for Folio.
//!
//! All stores implement `folio_core::HistoryStore`.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryHistory;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteHistory;

/// How many messages `get_session` attaches to a session.
pub const SESSION_MESSAGE_LIMIT: usize = 50;
