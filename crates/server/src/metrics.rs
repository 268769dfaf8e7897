//! Prometheus metrics for the dbprov server.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Labels never carry template names or caller ids, but the endpoint still
//! reveals provisioning volume and failure rates and should be
//! network-restricted to the scraper.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use dbprov_core::ProvisionOutcome;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static PROVISIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dbprov_provisions_total",
            "Total successful provisions by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static PROVISION_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dbprov_provision_failures_total",
            "Total failed provisions by error code",
        ),
        &["code"],
    )
    .expect("metric creation failed")
});

// Restores can take minutes; resets and reuse are sub-second.
pub static PROVISION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "dbprov_provision_duration_seconds",
            "Time taken to handle a provision request, including lock wait",
        )
        .buckets(vec![
            0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0,
        ]),
    )
    .expect("metric creation failed")
});

pub static PROVISIONS_IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "dbprov_provisions_in_flight",
        "Provision requests currently being handled",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests may build several routers in one process.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(PROVISIONS_TOTAL.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PROVISION_FAILURES_TOTAL.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PROVISION_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PROVISIONS_IN_FLIGHT.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

pub fn record_provision(outcome: ProvisionOutcome) {
    PROVISIONS_TOTAL.with_label_values(&[outcome.as_str()]).inc();
}

pub fn record_provision_failure(code: &str) {
    PROVISION_FAILURES_TOTAL.with_label_values(&[code]).inc();
}

/// Keeps [`PROVISIONS_IN_FLIGHT`] raised while alive.
pub struct InFlightGuard(());

impl InFlightGuard {
    pub fn new() -> Self {
        PROVISIONS_IN_FLIGHT.inc();
        Self(())
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        PROVISIONS_IN_FLIGHT.dec();
    }
}
