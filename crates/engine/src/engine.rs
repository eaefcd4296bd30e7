//! The conversational context engine.
//!
//! One call runs the whole pipeline:
//!
//! 1. **Validate** the request and resolve session id and model
//! 2. **Recall** recent turns from the history store
//! 3. **Classify** the message into topic flags
//! 4. **Build** the prompt from knowledge base + history
//! 5. **Generate** via the backend (blocking or streaming)
//! 6. **Normalize** the outcome and **persist** the turn
//!
//! Backend failures never escape: they become fallback responses. A failure
//! to recall history does escape, as [`EngineError::History`]. A failure to
//! write the finished turn is logged and the answer is still returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use folio_core::error::{GenerationError, MemoryError, ValidationError};
use folio_core::history::HistoryStore;
use folio_core::knowledge::KnowledgeBase;
use folio_core::message::{
    new_message_id, new_session_id, GenerationRequest, GenerationResponse, HistoryStats,
    NewSession, Session, StatsRange, StoredTurn,
};
use folio_core::provider::{GenerationBackend, GenerationOptions, TextStream};
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classifier::{KeywordClassifier, TopicClassifier, TopicFlags};
use crate::normalizer::ResponseNormalizer;
use crate::prompt::{truncate_chars, PromptBuilder};
use crate::stream_event::{ChatStream, ChatStreamEvent};

/// How much of the prompt is written to debug logs.
const PROMPT_LOG_CHARS: usize = 500;

/// Errors that escape the engine. Generation failures are not among them.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Could not access conversation history: {0}")]
    History(#[from] MemoryError),

    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),
}

/// Liveness of the engine's collaborators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub backend: String,
    pub backend_healthy: bool,
    pub models: Vec<String>,
    pub history: String,
    pub history_ok: bool,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.backend_healthy && self.history_ok
    }

    pub fn status(&self) -> &'static str {
        if self.is_healthy() { "healthy" } else { "degraded" }
    }
}

/// Everything generation needs, computed before the backend is called.
struct Prepared {
    request: GenerationRequest,
    session_id: String,
    model: String,
    prompt: String,
}

pub struct ContextEngine {
    backend: Arc<dyn GenerationBackend>,
    history: Arc<dyn HistoryStore>,
    classifier: Arc<dyn TopicClassifier>,
    prompts: PromptBuilder,
    normalizer: ResponseNormalizer,
    options: GenerationOptions,
    context_turns: usize,
}

impl ContextEngine {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        history: Arc<dyn HistoryStore>,
        knowledge: Arc<KnowledgeBase>,
    ) -> Self {
        Self {
            backend,
            history,
            classifier: Arc::new(KeywordClassifier::new()),
            prompts: PromptBuilder::new(knowledge),
            normalizer: ResponseNormalizer::default(),
            options: GenerationOptions::default(),
            context_turns: 5,
        }
    }

    /// Swap the topic classification policy.
    pub fn with_classifier(mut self, classifier: Arc<dyn TopicClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// How many past turns are recalled and woven into each prompt.
    pub fn with_context_turns(mut self, turns: usize) -> Self {
        self.context_turns = turns;
        self.prompts = self.prompts.with_max_history_turns(turns);
        self
    }

    pub fn with_normalizer(mut self, normalizer: ResponseNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Sampling parameters sent with every request.
    pub fn with_generation(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        self.prompts.knowledge()
    }

    pub fn classify(&self, message: &str) -> TopicFlags {
        self.classifier.classify(message)
    }

    async fn prepare(&self, mut request: GenerationRequest) -> Result<Prepared, EngineError> {
        request.validate()?;

        let session_id = request
            .session_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(new_session_id);
        request.session_id = Some(session_id.clone());

        let model = request
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.backend.default_model().to_string());

        let history = if self.context_turns == 0 {
            Vec::new()
        } else {
            self.history
                .recent_turns(&session_id, self.context_turns)
                .await?
        };

        let flags = self.classifier.classify(&request.message);
        let prompt = self.prompts.build(&request.message, &flags, &history);

        debug!(
            session_id = %session_id,
            classifier = self.classifier.name(),
            ?flags,
            history_turns = history.len(),
            prompt = %truncate_chars(&prompt, PROMPT_LOG_CHARS),
            "Prompt assembled"
        );

        Ok(Prepared {
            request,
            session_id,
            model,
            prompt,
        })
    }

    /// Answer one message, waiting for the complete response.
    pub async fn chat(&self, request: GenerationRequest) -> Result<GenerationResponse, EngineError> {
        let prepared = self.prepare(request).await?;

        info!(
            session_id = %prepared.session_id,
            backend = self.backend.name(),
            model = %prepared.model,
            "Generating response"
        );

        let outcome = self
            .backend
            .generate(&prepared.prompt, &prepared.model, &self.options)
            .await
            .map(|completion| completion.text);

        if let Err(e) = &outcome {
            warn!(session_id = %prepared.session_id, kind = e.kind(), error = %e, "Generation failed, using fallback");
        }

        let response = self
            .normalizer
            .normalize(&prepared.request, &prepared.model, outcome);

        if let Err(e) = persist(self.history.as_ref(), &prepared.request, &response).await {
            warn!(session_id = %response.session_id, error = %e, "Failed to persist turn");
        }
        Ok(response)
    }

    /// Answer one message as a stream of events.
    ///
    /// The last event is always `Done`. If the backend stream cannot be
    /// opened, the stream carries a single `Fallback` before `Done`.
    /// Dropping the stream closes the backend connection.
    pub async fn chat_stream(&self, request: GenerationRequest) -> Result<ChatStream, EngineError> {
        let prepared = self.prepare(request).await?;

        info!(
            session_id = %prepared.session_id,
            backend = self.backend.name(),
            model = %prepared.model,
            "Opening response stream"
        );

        match self
            .backend
            .generate_stream(&prepared.prompt, &prepared.model, &self.options)
            .await
        {
            Ok(deltas) => Ok(stream_events(StreamState {
                deltas,
                history: Arc::clone(&self.history),
                request: prepared.request,
                session_id: prepared.session_id,
                model: prepared.model,
                normalizer: self.normalizer.clone(),
                message_id: new_message_id(),
                accumulated: String::new(),
                phase: Phase::Streaming,
            })),
            Err(e) => {
                warn!(session_id = %prepared.session_id, kind = e.kind(), error = %e, "Stream failed to open, using fallback");
                let response =
                    self.normalizer
                        .normalize(&prepared.request, &prepared.model, Err(e));

                if let Err(e) = persist(self.history.as_ref(), &prepared.request, &response).await {
                    warn!(error = %e, "Failed to persist fallback turn");
                }

                let events = vec![
                    ChatStreamEvent::Fallback {
                        content: response.response.clone(),
                        error: response.error.clone().unwrap_or_default(),
                    },
                    ChatStreamEvent::Done {
                        message_id: response.message_id,
                        session_id: response.session_id,
                        model: response.model,
                        success: false,
                    },
                ];
                Ok(Box::pin(futures::stream::iter(events)))
            }
        }
    }

    /// Probe the backend and the history store.
    pub async fn health(&self) -> HealthReport {
        let (backend_healthy, models) =
            futures::join!(self.backend.is_healthy(), self.backend.list_models());

        let history_ok = match self.history.stats(StatsRange::Day).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "History store health check failed");
                false
            }
        };

        HealthReport {
            backend: self.backend.name().to_string(),
            backend_healthy,
            models,
            history: self.history.name().to_string(),
            history_ok,
            timestamp: Utc::now(),
        }
    }

    pub async fn models(&self) -> Vec<String> {
        self.backend.list_models().await
    }

    pub fn starters(&self) -> &[String] {
        &self.knowledge().conversation_starters
    }

    pub fn welcome_message(&self) -> &str {
        &self.knowledge().welcome_message
    }

    pub async fn history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredTurn>, EngineError> {
        Ok(self.history.session_messages(session_id, limit).await?)
    }

    pub async fn session(&self, session_id: &str) -> Result<Option<Session>, EngineError> {
        Ok(self.history.get_session(session_id).await?)
    }

    pub async fn create_session(&self, session: NewSession) -> Result<Session, EngineError> {
        Ok(self.history.create_session(session).await?)
    }

    pub async fn stats(&self, range: StatsRange) -> Result<HistoryStats, EngineError> {
        Ok(self.history.stats(range).await?)
    }
}

async fn persist(
    history: &dyn HistoryStore,
    request: &GenerationRequest,
    response: &GenerationResponse,
) -> Result<(), MemoryError> {
    let context = request.context.clone().map(serde_json::Value::Object);
    let turn = StoredTurn::from_response(response, request.user_id.clone(), context);
    history.append_turn(turn).await?;
    history.touch_session(&response.session_id).await
}

enum Phase {
    Streaming,
    Closing { success: bool },
    Finished,
}

struct StreamState {
    deltas: TextStream,
    history: Arc<dyn HistoryStore>,
    request: GenerationRequest,
    session_id: String,
    model: String,
    normalizer: ResponseNormalizer,
    message_id: String,
    accumulated: String,
    phase: Phase,
}

impl StreamState {
    /// Release the backend connection, persist what arrived, emit `Done`.
    async fn finish(&mut self, success: bool) -> ChatStreamEvent {
        self.deltas = Box::pin(futures::stream::empty());
        self.phase = Phase::Finished;

        let text = self.accumulated.trim();
        if text.is_empty() {
            debug!(session_id = %self.session_id, "Stream produced no text, nothing persisted");
        } else {
            let turn = StoredTurn {
                id: self.message_id.clone(),
                session_id: self.session_id.clone(),
                user_id: self.request.user_id.clone(),
                message: self.request.message.clone(),
                response: text.to_string(),
                timestamp: Utc::now(),
                model: Some(self.model.clone()),
                context: self.request.context.clone().map(serde_json::Value::Object),
            };
            let stored = match self.history.append_turn(turn).await {
                Ok(()) => self.history.touch_session(&self.session_id).await,
                Err(e) => Err(e),
            };
            if let Err(e) = stored {
                warn!(session_id = %self.session_id, error = %e, "Failed to persist streamed turn");
            }
        }

        ChatStreamEvent::Done {
            message_id: self.message_id.clone(),
            session_id: self.session_id.clone(),
            model: self.model.clone(),
            success,
        }
    }
}

fn stream_events(state: StreamState) -> ChatStream {
    Box::pin(futures::stream::unfold(state, |mut state| async move {
        match state.phase {
            Phase::Streaming => match state.deltas.next().await {
                Some(Ok(text)) => {
                    state.accumulated.push_str(&text);
                    Some((ChatStreamEvent::Chunk { content: text }, state))
                }
                Some(Err(e)) => {
                    warn!(session_id = %state.session_id, error = %e, "Response stream interrupted");
                    state.phase = Phase::Closing { success: false };
                    Some((
                        ChatStreamEvent::Error {
                            message: e.to_string(),
                        },
                        state,
                    ))
                }
                None if state.accumulated.trim().is_empty() => {
                    let error = GenerationError::MalformedResponse("no response generated".into());
                    warn!(session_id = %state.session_id, error = %error, "Stream ended without text, using fallback");
                    let content = state.normalizer.fallback();
                    state.accumulated = content.clone();
                    state.phase = Phase::Closing { success: false };
                    Some((
                        ChatStreamEvent::Fallback {
                            content,
                            error: error.to_string(),
                        },
                        state,
                    ))
                }
                None => {
                    let done = state.finish(true).await;
                    Some((done, state))
                }
            },
            Phase::Closing { success } => {
                let done = state.finish(success).await;
                Some((done, state))
            }
            Phase::Finished => None,
        }
    }))
}
