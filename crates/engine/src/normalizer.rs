//! Response normalization: every generation outcome becomes a well-formed
//! [`GenerationResponse`], success or fallback.

use chrono::Utc;
use folio_core::error::GenerationError;
use folio_core::message::{new_message_id, GenerationRequest, GenerationResponse, DEFAULT_SESSION_ID};
use rand::seq::IndexedRandom;

/// Canned answers used when the backend fails.
pub const DEFAULT_FALLBACK_RESPONSES: [&str; 3] = [
    "That's an interesting question! While I don't have specific information about that, I'd be happy to tell you about my relevant experience with similar technologies or projects.",
    "I don't have details about that particular topic, but I can share information about my related skills and experience. What specific aspect would you like to know more about?",
    "That's outside my current knowledge base, but I'd love to discuss my experience with related technologies or projects. Is there something specific you'd like to know about my background?",
];

#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    fallbacks: Vec<String>,
}

impl ResponseNormalizer {
    /// A normalizer with a custom fallback pool. Blank entries are dropped;
    /// an empty pool falls back to [`DEFAULT_FALLBACK_RESPONSES`].
    pub fn new<I, S>(fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fallbacks: Vec<String> = fallbacks
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.trim().is_empty())
            .collect();

        if fallbacks.is_empty() {
            return Self::default();
        }
        Self { fallbacks }
    }

    pub fn fallback_pool(&self) -> &[String] {
        &self.fallbacks
    }

    /// One fallback, chosen uniformly at random.
    pub fn fallback(&self) -> String {
        self.fallbacks
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_FALLBACK_RESPONSES[0].to_string())
    }

    /// Wrap a generation outcome. Never fails.
    ///
    /// Blank text counts as a failed generation and gets a fallback.
    ///
    /// `model` is the resolved model name (request override or backend
    /// default) and is echoed on both paths.
    pub fn normalize(
        &self,
        request: &GenerationRequest,
        model: &str,
        outcome: Result<String, GenerationError>,
    ) -> GenerationResponse {
        let outcome = outcome.and_then(|text| {
            let text = text.trim();
            if text.is_empty() {
                Err(GenerationError::MalformedResponse("no response generated".into()))
            } else {
                Ok(text.to_string())
            }
        });

        let (response, success, error) = match outcome {
            Ok(text) => (text, true, None),
            Err(e) => (self.fallback(), false, Some(e.to_string())),
        };

        GenerationResponse {
            message: request.message.clone(),
            response,
            session_id: request
                .session_id
                .clone()
                .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string()),
            message_id: new_message_id(),
            timestamp: Utc::now(),
            model: model.to_string(),
            success,
            error,
        }
    }
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self {
            fallbacks: DEFAULT_FALLBACK_RESPONSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest::new("What are your technical skills?").with_session("s1")
    }

    #[test]
    fn success_trims_and_echoes() {
        let normalizer = ResponseNormalizer::default();
        let resp = normalizer.normalize(&request(), "llama3.1", Ok("\n  I use Rust.  \n".into()));
        assert!(resp.success);
        assert_eq!(resp.response, "I use Rust.");
        assert_eq!(resp.message, "What are your technical skills?");
        assert_eq!(resp.session_id, "s1");
        assert_eq!(resp.model, "llama3.1");
        assert!(resp.message_id.starts_with("msg_"));
        assert!(resp.error.is_none());
    }

    #[test]
    fn timeout_becomes_fallback() {
        let normalizer = ResponseNormalizer::default();
        let resp = normalizer.normalize(
            &request(),
            "llama3.1",
            Err(GenerationError::Timeout("no response within 30s".into())),
        );
        assert!(!resp.success);
        assert!(!resp.response.is_empty());
        assert!(DEFAULT_FALLBACK_RESPONSES.contains(&resp.response.as_str()));
        assert_eq!(resp.message, "What are your technical skills?");
        assert!(resp.error.unwrap().contains("timed out"));
    }

    #[test]
    fn blank_text_becomes_fallback() {
        let normalizer = ResponseNormalizer::default();
        let resp = normalizer.normalize(&request(), "llama3.1", Ok(" \n ".into()));
        assert!(!resp.success);
        assert!(DEFAULT_FALLBACK_RESPONSES.contains(&resp.response.as_str()));
        assert!(resp.error.unwrap().contains("no response generated"));
    }

    #[test]
    fn missing_session_uses_default() {
        let normalizer = ResponseNormalizer::default();
        let resp = normalizer.normalize(&GenerationRequest::new("hi"), "m", Ok("Hello".into()));
        assert_eq!(resp.session_id, DEFAULT_SESSION_ID);
    }

    #[test]
    fn custom_pool_drops_blanks() {
        let normalizer = ResponseNormalizer::new(["Sorry, try again later.", "   "]);
        assert_eq!(normalizer.fallback_pool().len(), 1);
        assert_eq!(normalizer.fallback(), "Sorry, try again later.");
    }

    #[test]
    fn empty_pool_uses_defaults() {
        let normalizer = ResponseNormalizer::new(Vec::<String>::new());
        assert_eq!(normalizer.fallback_pool().len(), DEFAULT_FALLBACK_RESPONSES.len());
    }

    #[test]
    fn fallback_always_from_pool() {
        let normalizer = ResponseNormalizer::default();
        for _ in 0..50 {
            let choice = normalizer.fallback();
            assert!(normalizer.fallback_pool().contains(&choice));
        }
    }
}
