//! Configuration loading, validation, and management for Folio.
//!
//! Loads configuration from `~/.folio/config.toml` with environment
//! variable overrides. Validates all settings at startup. The resulting
//! values are handed to constructors explicitly; nothing reads them from
//! global state.

use folio_core::GenerationOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.folio/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation backend (Ollama) settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Conversation history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Prompt and response settings
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_context_window")]
    pub context_window: u32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,

    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_secs: u64,

    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3.1".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    500
}
fn default_context_window() -> u32 {
    4096
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
fn default_generate_timeout() -> u64 {
    30
}
fn default_health_timeout() -> u64 {
    5
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            context_window: default_context_window(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
            generate_timeout_secs: default_generate_timeout(),
            health_timeout_secs: default_health_timeout(),
        }
    }
}

impl BackendConfig {
    /// Sampling parameters for every generation request.
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_k: self.top_k,
            top_p: self.top_p,
            repeat_penalty: self.repeat_penalty,
        }
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// "sqlite" or "in_memory"
    #[serde(default = "default_history_backend")]
    pub backend: String,

    /// SQLite database file; defaults to `~/.folio/chatbot.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// How many past turns are fed into each prompt
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,

    /// Default page size when listing a session's history
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

fn default_history_backend() -> String {
    "sqlite".into()
}
fn default_context_turns() -> usize {
    5
}
fn default_list_limit() -> usize {
    50
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            path: None,
            context_turns: default_context_turns(),
            list_limit: default_list_limit(),
        }
    }
}

impl HistoryConfig {
    /// The database path, falling back to the config directory.
    pub fn database_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("chatbot.db"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// TOML or JSON knowledge base replacing the built-in profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_file: Option<PathBuf>,

    /// Replacement fallback pool; must not be empty when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_responses: Option<Vec<String>>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.folio/config.toml).
    ///
    /// Environment variables override file values:
    /// - `OLLAMA_BASE_URL`, `OLLAMA_MODEL`, `OLLAMA_TEMPERATURE`,
    ///   `OLLAMA_MAX_TOKENS`, `OLLAMA_CONTEXT_WINDOW`
    /// - `DATABASE_PATH`
    /// - `FOLIO_KNOWLEDGE_FILE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path, |key| std::env::var(key).ok())
    }

    /// Load from `path`, then apply overrides from `env`, then validate.
    pub fn load_with_env(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn apply_env_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = env("OLLAMA_BASE_URL") {
            self.backend.base_url = url;
        }
        if let Some(model) = env("OLLAMA_MODEL") {
            self.backend.model = model;
        }
        if let Some(raw) = env("OLLAMA_TEMPERATURE") {
            self.backend.temperature = parse_env("OLLAMA_TEMPERATURE", &raw)?;
        }
        if let Some(raw) = env("OLLAMA_MAX_TOKENS") {
            self.backend.max_tokens = parse_env("OLLAMA_MAX_TOKENS", &raw)?;
        }
        if let Some(raw) = env("OLLAMA_CONTEXT_WINDOW") {
            self.backend.context_window = parse_env("OLLAMA_CONTEXT_WINDOW", &raw)?;
        }
        if let Some(path) = env("DATABASE_PATH") {
            self.history.path = Some(PathBuf::from(path));
        }
        if let Some(path) = env("FOLIO_KNOWLEDGE_FILE") {
            self.engine.knowledge_file = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".folio")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let backend = &self.backend;

        if backend.temperature < 0.0 || backend.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "backend.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if backend.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "backend.max_tokens must be > 0".into(),
            ));
        }

        if backend.base_url.trim().is_empty() || backend.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.base_url and backend.model must be set".into(),
            ));
        }

        if backend.generate_timeout_secs == 0 || backend.health_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "backend timeouts must be > 0".into(),
            ));
        }

        if !matches!(self.history.backend.as_str(), "sqlite" | "in_memory") {
            return Err(ConfigError::ValidationError(format!(
                "history.backend must be \"sqlite\" or \"in_memory\", got \"{}\"",
                self.history.backend
            )));
        }

        if let Some(pool) = &self.engine.fallback_responses {
            if pool.iter().all(|s| s.trim().is_empty()) {
                return Err(ConfigError::ValidationError(
                    "engine.fallback_responses must contain at least one non-empty message"
                        .into(),
                ));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::ValidationError(format!("{key}={raw:?}: {e}")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.backend.base_url, "http://localhost:11434");
        assert_eq!(config.backend.model, "llama3.1");
        assert_eq!(config.history.context_turns, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.backend.model, config.backend.model);
        assert_eq!(parsed.backend.max_tokens, config.backend.max_tokens);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.backend.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_history_backend_rejected() {
        let mut config = AppConfig::default();
        config.history.backend = "postgres".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_fallback_pool_rejected() {
        let mut config = AppConfig::default();
        config.engine.fallback_responses = Some(vec!["  ".into()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config =
            AppConfig::load_with_env(Path::new("/nonexistent/config.toml"), no_env).unwrap();
        assert_eq!(config.backend.model, "llama3.1");
    }

    #[test]
    fn file_values_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[backend]
model = "mistral"
max_tokens = 256

[history]
backend = "in_memory"
context_turns = 3
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.backend.model, "mistral");
        assert_eq!(config.backend.max_tokens, 256);
        assert_eq!(config.backend.base_url, "http://localhost:11434");
        assert_eq!(config.history.backend, "in_memory");
        assert_eq!(config.history.context_turns, 3);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backend\nmodel = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OLLAMA_BASE_URL", "http://gpu-box:11434"),
            ("OLLAMA_MODEL", "qwen2"),
            ("OLLAMA_TEMPERATURE", "0.2"),
            ("OLLAMA_MAX_TOKENS", "900"),
            ("DATABASE_PATH", "/var/lib/folio/chat.db"),
        ]);
        let config = AppConfig::load_with_env(Path::new("/nonexistent/config.toml"), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.backend.base_url, "http://gpu-box:11434");
        assert_eq!(config.backend.model, "qwen2");
        assert!((config.backend.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.backend.max_tokens, 900);
        assert_eq!(
            config.history.database_path(),
            PathBuf::from("/var/lib/folio/chat.db")
        );
    }

    #[test]
    fn unparseable_env_value_rejected() {
        let result = AppConfig::load_with_env(Path::new("/nonexistent/config.toml"), |k| {
            (k == "OLLAMA_MAX_TOKENS").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn generation_options_follow_backend() {
        let mut config = AppConfig::default();
        config.backend.temperature = 0.3;
        config.backend.max_tokens = 128;
        let opts = config.backend.generation_options();
        assert!((opts.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(opts.max_tokens, 128);
        assert_eq!(opts.top_k, 40);
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("llama3.1"));
        assert!(toml_str.contains("11434"));
    }
}
