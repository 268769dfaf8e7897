//! Application state shared across handlers.

use dbprov_core::config::AppConfig;
use dbprov_engine::{Engine, StrategyOptions};
use dbprov_metadata::{MetadataStore, UsageRepo};
use dbprov_provisioner::{InstanceLocks, Provisioner, UsageTracker};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Database engine hosting the provisioned instances.
    pub engine: Arc<dyn Engine>,
    /// Usage tracking store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Provisioning orchestrator.
    pub provisioner: Arc<Provisioner>,
    /// Cancelled when the server begins shutting down. Requests still waiting
    /// for an instance lock give up with 503.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: AppConfig,
        engine: Arc<dyn Engine>,
        metadata: Arc<dyn MetadataStore>,
        shutdown: CancellationToken,
    ) -> Self {
        let repo: Arc<dyn UsageRepo> = metadata.clone();
        let provisioner = Provisioner::new(
            engine.clone(),
            Arc::new(InstanceLocks::new()),
            UsageTracker::new(repo),
            StrategyOptions::from_config(&config.restore),
        );

        Self {
            config: Arc::new(config),
            engine,
            metadata,
            provisioner: Arc::new(provisioner),
            shutdown,
        }
    }
}
