//! Error types for Lesa.

use thiserror::Error;

/// Library-level error type for Lesa operations.
#[derive(Error, Debug)]
pub enum LesaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Failed to persist update: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("An embedding job is already running for document: {0}")]
    JobInProgress(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Lesa operations.
pub type Result<T> = std::result::Result<T, LesaError>;
