//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {component} '{value}': {reason}")]
    InvalidIdentifier {
        component: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
