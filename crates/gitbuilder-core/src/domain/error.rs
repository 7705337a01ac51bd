//! Domain-level error taxonomy for gitbuilder.

use verdict_state::StorageError;

/// gitbuilder domain errors.
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("git error: {0}")]
    Git(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("ledger error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gitbuilder domain operations.
pub type Result<T> = std::result::Result<T, BuilderError>;
