//! Knowledge base loading from TOML or JSON files.

use std::path::{Path, PathBuf};

use folio_core::knowledge::KnowledgeBase;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge file at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse knowledge file at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Unsupported knowledge file format: {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid knowledge base: {0}")]
    Invalid(String),
}

/// Load a knowledge base, choosing the format by file extension.
pub fn load_knowledge(path: &Path) -> Result<KnowledgeBase, KnowledgeError> {
    let content = std::fs::read_to_string(path).map_err(|e| KnowledgeError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let parse_err = |reason: String| KnowledgeError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let kb: KnowledgeBase = match extension.as_deref() {
        Some("toml") => toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?,
        _ => return Err(KnowledgeError::UnsupportedFormat(path.to_path_buf())),
    };

    if kb.personal_info.name.trim().is_empty() {
        return Err(KnowledgeError::Invalid("personalInfo.name must not be empty".into()));
    }

    info!(
        path = %path.display(),
        experience = kb.experience.len(),
        projects = kb.projects.len(),
        "Loaded knowledge base"
    );
    Ok(kb)
}

/// Load from `path` when given, otherwise use the built-in sample profile.
pub fn load_or_sample(path: Option<&Path>) -> Result<KnowledgeBase, KnowledgeError> {
    match path {
        Some(path) => load_knowledge(path),
        None => Ok(KnowledgeBase::sample()),
    }
}
