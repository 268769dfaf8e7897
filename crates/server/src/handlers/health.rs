//! Health endpoint.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub engine: &'static str,
}

/// GET /v1/health - Health check.
///
/// Unauthenticated, for load balancer and orchestrator probes. Pings the
/// engine and the usage store; returns 503 if either is unreachable.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.engine.health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Engine health check failed");
        ApiError::Unavailable(format!("engine: {e}"))
    })?;

    state.metadata.health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Metadata health check failed");
        ApiError::Unavailable(format!("metadata store: {e}"))
    })?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        engine: state.engine.backend_name(),
    }))
}
