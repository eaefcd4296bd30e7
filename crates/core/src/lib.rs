//! # Folio Core
//!
//! Domain types, traits, and error definitions for the Folio conversational
//! context engine. This crate has **no framework dependencies**: it defines
//! the domain model that all other crates implement against.
//!
//! Every collaborator the engine talks to is a trait here. Implementations
//! live in their respective crates:
//! - [`GenerationBackend`] → `folio-providers`
//! - [`HistoryStore`] → `folio-memory`

pub mod error;
pub mod history;
pub mod knowledge;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{DecodeError, GenerationError, MemoryError, ValidationError};
pub use history::HistoryStore;
pub use knowledge::KnowledgeBase;
pub use message::{
    ConversationTurn, DailyCount, GenerationRequest, GenerationResponse, HistoryStats, NewSession,
    QuestionCount, Session, StatsRange, StoredTurn,
};
pub use provider::{Completion, GenerationBackend, GenerationOptions, TextStream};
