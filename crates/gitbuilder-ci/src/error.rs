//! Build execution errors.

use gitbuilder_core::BuilderError;
use thiserror::Error;
use verdict_state::StorageError;

#[derive(Debug, Error)]
pub enum BuildError {
    /// The build command could not be started.
    #[error("failed to start build command: {0}")]
    Spawn(#[source] std::io::Error),

    /// Reading the build's output or waiting on it failed.
    #[error("I/O error while running build: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger could not be read or written. Always fatal for the cycle.
    #[error("ledger error: {0}")]
    Ledger(#[from] StorageError),

    #[error(transparent)]
    Builder(#[from] BuilderError),
}

pub type Result<T> = std::result::Result<T, BuildError>;
