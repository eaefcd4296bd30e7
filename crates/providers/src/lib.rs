//! Generation backend implementations for Folio.
//!
//! All backends implement the `folio_core::GenerationBackend` trait.
//! Streaming responses are decoded by [`ndjson::decode_stream`].

pub mod ndjson;
pub mod ollama;

pub use ndjson::{decode_stream, Frame, NdjsonDecoder};
pub use ollama::OllamaClient;
