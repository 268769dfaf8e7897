//! HTTP API server for dbprov.
//!
//! Exposes the provisioning orchestrator over HTTP:
//! - `POST /{template}/{caller}` to create, reuse or reset an instance
//! - `GET /v1/instances` to list tracked instances
//! - `GET /v1/health` and `GET /metrics` for operations

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::TraceId;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
