//! Provisioning error types.

use dbprov_engine::EngineError;
use thiserror::Error;

/// Errors returned by [`crate::Provisioner::provision`].
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A path component failed identifier validation. Nothing was executed.
    #[error("{0}")]
    InvalidIdentifier(dbprov_core::Error),

    /// The engine is not set up the way provisioning needs.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Engine(EngineError),

    /// The request was cancelled before any engine command ran.
    #[error("provisioning cancelled")]
    Cancelled,
}

impl ProvisionError {
    /// Stable machine-readable code, used in API bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::Configuration(_) => "configuration_error",
            Self::Cancelled => "cancelled",
            Self::Engine(err) => match err {
                EngineError::SnapshotNotFound(_) => "snapshot_not_found",
                EngineError::Timeout { .. } => "engine_timeout",
                EngineError::Connection(_) | EngineError::Tds(_) | EngineError::Io(_) => {
                    "engine_unavailable"
                }
                _ => "engine_error",
            },
        }
    }
}

impl From<dbprov_core::Error> for ProvisionError {
    fn from(err: dbprov_core::Error) -> Self {
        Self::InvalidIdentifier(err)
    }
}

impl From<EngineError> for ProvisionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Configuration(msg) => Self::Configuration(msg),
            other => Self::Engine(other),
        }
    }
}
