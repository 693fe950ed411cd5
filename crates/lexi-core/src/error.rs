//! Error types for Lexi.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Non-success status, exhausted retries or transport failure from the
    /// completion provider.
    #[error("Upstream model error: {0}")]
    Upstream(String),

    /// Model output that could not be parsed where a parse failure is fatal.
    #[error("Failed to parse model response: {0}")]
    ModelOutput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error originates from the remote model (status, retries or output).
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::ModelOutput(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
