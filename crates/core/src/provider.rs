//! Generation backend trait: the abstraction over the text-generation service.
//!
//! A backend knows how to turn a finished prompt into text, either as a
//! single blocking call or as a lazy stream of text fragments.
//!
//! Implementations: Ollama (`folio-providers`), scripted backends in tests.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature (0.0 = deterministic, higher = more creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens (`num_predict` on the wire)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    500
}
fn default_top_k() -> u32 {
    40
}
fn default_top_p() -> f32 {
    0.9
}
fn default_repeat_penalty() -> f32 {
    1.1
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
        }
    }
}

/// A complete (non-streaming) generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text, untrimmed.
    pub text: String,

    /// Which model produced it.
    pub model: String,
}

/// A lazy, finite, non-restartable sequence of text fragments.
///
/// An `Err` item means the transport failed mid-stream; it is always the
/// last item. Dropping the stream releases the underlying connection.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// The core generation backend trait.
///
/// The engine calls `generate()` or `generate_stream()` without knowing
/// which service sits behind it.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "ollama").
    fn name(&self) -> &str;

    /// The model used when a request does not name one.
    fn default_model(&self) -> &str;

    /// Send a prompt and wait for the complete result.
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<Completion, GenerationError>;

    /// Send a prompt and get a lazy stream of text fragments.
    ///
    /// Default implementation calls `generate()` and yields the result as a
    /// single fragment.
    async fn generate_stream(
        &self,
        prompt: &str,
        model: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<TextStream, GenerationError> {
        let completion = self.generate(prompt, model, options).await?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok(completion.text)
        })))
    }

    /// Can we reach the backend? Never fails; any problem reads as `false`.
    async fn is_healthy(&self) -> bool {
        true
    }

    /// Model names the backend can serve. Best effort: empty on failure.
    async fn list_models(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct EchoBackend;

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        fn default_model(&self) -> &str {
            "echo-1"
        }

        async fn generate(
            &self,
            prompt: &str,
            model: &str,
            _options: &GenerationOptions,
        ) -> std::result::Result<Completion, GenerationError> {
            Ok(Completion {
                text: prompt.to_uppercase(),
                model: model.into(),
            })
        }
    }

    #[test]
    fn generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(opts.max_tokens, 500);
        assert_eq!(opts.top_k, 40);
        assert!((opts.top_p - 0.9).abs() < f32::EPSILON);
        assert!((opts.repeat_penalty - 1.1).abs() < f32::EPSILON);
    }

    #[test]
    fn generation_options_partial_deserialize() {
        let opts: GenerationOptions = serde_json::from_str(r#"{"temperature":0.2}"#).unwrap();
        assert!((opts.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(opts.max_tokens, 500);
    }

    #[tokio::test]
    async fn default_stream_wraps_generate() {
        let backend = EchoBackend;
        let mut stream = backend
            .generate_stream("abc", "echo-1", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "ABC");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn default_health_and_models() {
        let backend = EchoBackend;
        assert!(backend.is_healthy().await);
        assert!(backend.list_models().await.is_empty());
    }
}
