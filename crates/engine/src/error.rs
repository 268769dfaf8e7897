//! Engine gateway error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the database engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine or its catalog is not set up the way provisioning needs.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("{operation} failed: {message}")]
    Command {
        operation: &'static str,
        message: String,
    },

    #[error("unexpected result from {operation}: {message}")]
    UnexpectedResult {
        operation: &'static str,
        message: String,
    },

    #[error("tds error: {0}")]
    Tds(#[from] tiberius::error::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether this error stems from configuration rather than a failed command.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
