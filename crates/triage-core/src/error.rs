//! Error types for the triage pipeline.

use thiserror::Error;

/// Result alias for triage operations.
pub type Result<T> = std::result::Result<T, TriageError>;

/// Everything that can fail a triage request (or a seed import).
///
/// Translation failures never reach this type: the normalizer degrades to the
/// untranslated query instead.
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    BackendStatus { status: u16, body: String },

    #[error("backend response parse failed: {0}")]
    BackendResponse(String),

    #[error("{0}")]
    MalformedRequest(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid seed data: {0}")]
    Seed(String),
}
