//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dbprov_provisioner::ProvisionError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("metadata error: {0}")]
    Metadata(#[from] dbprov_metadata::MetadataError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Unavailable(_) => "unavailable",
            Self::Internal(_) => "internal_error",
            Self::Provision(e) => e.code(),
            Self::Metadata(_) => "metadata_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Provision(e) => match e {
                ProvisionError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
                ProvisionError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                ProvisionError::Configuration(_) | ProvisionError::Engine(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Metadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use dbprov_engine::EngineError;

    #[test]
    fn provision_errors_map_to_status() {
        let invalid: ApiError = ProvisionError::from(
            dbprov_core::Identifier::caller("a_b").unwrap_err(),
        )
        .into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code(), "invalid_identifier");

        let cancelled: ApiError = ProvisionError::Cancelled.into();
        assert_eq!(cancelled.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(cancelled.code(), "cancelled");

        let missing: ApiError =
            ProvisionError::from(EngineError::SnapshotNotFound("a_b_dbss".into())).into();
        assert_eq!(missing.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(missing.code(), "snapshot_not_found");
        assert_eq!(missing.to_string(), "snapshot not found: a_b_dbss");
    }

    #[test]
    fn unauthorized_message_is_bare() {
        let err = ApiError::Unauthorized("missing API key".to_string());
        assert_eq!(err.to_string(), "missing API key");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
