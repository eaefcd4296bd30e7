//! Subcommand implementations.

pub mod chat;
pub mod health;
pub mod history;
pub mod init;
pub mod models;
pub mod session;
pub mod starters;
pub mod stats;

use std::sync::Arc;

use folio_config::AppConfig;
use folio_core::history::HistoryStore;
use folio_engine::{load_or_sample, ContextEngine, ResponseNormalizer};
use folio_memory::{InMemoryHistory, SqliteHistory};
use folio_providers::OllamaClient;
use tracing::debug;

/// Load the config, failing with a readable message.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Wire backend, history store and knowledge base into an engine.
pub async fn build_engine(config: &AppConfig) -> Result<ContextEngine, Box<dyn std::error::Error>> {
    let backend = OllamaClient::new(&config.backend)?;

    let history: Arc<dyn HistoryStore> = match config.history.backend.as_str() {
        "in_memory" => Arc::new(InMemoryHistory::new()),
        _ => {
            let path = config.history.database_path();
            debug!(path = %path.display(), "Opening history database");
            Arc::new(SqliteHistory::open(&path).await?)
        }
    };

    let knowledge = load_or_sample(config.engine.knowledge_file.as_deref())?;

    let mut engine = ContextEngine::new(Arc::new(backend), history, Arc::new(knowledge))
        .with_context_turns(config.history.context_turns)
        .with_generation(config.backend.generation_options());

    if let Some(fallbacks) = &config.engine.fallback_responses {
        engine = engine.with_normalizer(ResponseNormalizer::new(fallbacks.iter().cloned()));
    }

    Ok(engine)
}
