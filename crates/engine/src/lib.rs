//! The Folio conversational context engine.
//!
//! Turns a question into an answer about a fixed personal knowledge base:
//!
//! 1. **Classify** the message into topic flags ([`classifier`])
//! 2. **Build** a bounded prompt from the matching knowledge and recent
//!    history ([`prompt`])
//! 3. **Generate** through a `GenerationBackend`, blocking or streaming
//! 4. **Normalize** failures into fallback answers ([`normalizer`])
//!
//! [`ContextEngine`] wires the steps together with a history store.

pub mod classifier;
pub mod engine;
pub mod knowledge;
pub mod normalizer;
pub mod prompt;
pub mod stream_event;

pub use classifier::{KeywordClassifier, TopicClassifier, TopicFlags};
pub use engine::{ContextEngine, EngineError, HealthReport};
pub use knowledge::{load_knowledge, load_or_sample, KnowledgeError};
pub use normalizer::{ResponseNormalizer, DEFAULT_FALLBACK_RESPONSES};
pub use prompt::PromptBuilder;
pub use stream_event::{ChatStream, ChatStreamEvent};
