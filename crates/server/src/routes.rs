//! Route configuration.

use crate::auth::{api_key_middleware, trace_middleware};
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Everything here requires the API key.
    let protected = Router::new()
        .route("/v1/instances", get(handlers::list_instances))
        .route("/{template}/{caller}", post(handlers::provision_instance))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    // Health check (intentionally unauthenticated for load balancers/k8s probes)
    let mut router = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .merge(protected);

    // SECURITY: When enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(middleware::from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
