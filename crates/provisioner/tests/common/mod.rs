//! Shared fixtures for provisioning tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dbprov_engine::{
    Engine, EngineConnection, EngineResult, MemoryEngine, ScalarValue, Statement, StatementKind,
    StrategyOptions,
};
use dbprov_metadata::{
    InstanceUsageRow, MetadataError, MetadataResult, SqliteStore, UsageRepo,
};
use dbprov_provisioner::{InstanceLocks, Provisioner, UsageTracker};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

/// Counts, per instance, how many connections are inside the locked region.
///
/// A connection enters the region when it probes the instance's existence
/// (the first thing the orchestrator does once the lock is held) and leaves it
/// when the connection is closed or dropped.
#[derive(Default)]
pub struct ConcurrencyProbe {
    state: Mutex<ProbeState>,
}

#[derive(Default)]
struct ProbeState {
    in_flight: HashMap<String, usize>,
    max_in_flight: HashMap<String, usize>,
}

impl ConcurrencyProbe {
    fn enter(&self, instance: &str) {
        let mut state = self.state.lock().unwrap();
        let current = {
            let entry = state.in_flight.entry(instance.to_string()).or_default();
            *entry += 1;
            *entry
        };
        let max = state.max_in_flight.entry(instance.to_string()).or_default();
        *max = (*max).max(current);
    }

    fn leave(&self, instance: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.in_flight.get_mut(instance) {
            *entry -= 1;
        }
    }

    /// Highest number of overlapping strategies seen for `instance`.
    pub fn max_in_flight(&self, instance: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.max_in_flight.get(instance).copied().unwrap_or(0)
    }
}

/// Engine wrapper reporting locked-region overlap to a [`ConcurrencyProbe`].
pub struct InstrumentedEngine {
    inner: MemoryEngine,
    probe: Arc<ConcurrencyProbe>,
}

#[async_trait]
impl Engine for InstrumentedEngine {
    async fn connect(&self) -> EngineResult<Box<dyn EngineConnection>> {
        let inner = self.inner.connect().await?;
        Ok(Box::new(InstrumentedConnection {
            inner: Some(inner),
            probe: self.probe.clone(),
            active: None,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "instrumented"
    }
}

struct InstrumentedConnection {
    inner: Option<Box<dyn EngineConnection>>,
    probe: Arc<ConcurrencyProbe>,
    active: Option<String>,
}

impl InstrumentedConnection {
    fn inner(&mut self) -> &mut Box<dyn EngineConnection> {
        self.inner.as_mut().expect("connection already closed")
    }
}

#[async_trait]
impl EngineConnection for InstrumentedConnection {
    async fn query_scalar(&mut self, statement: &Statement) -> EngineResult<Option<ScalarValue>> {
        if let StatementKind::DatabaseId { name } = statement.kind() {
            if self.active.is_none() && !name.ends_with("_dbss") {
                self.probe.enter(name);
                self.active = Some(name.clone());
            }
        }
        self.inner().query_scalar(statement).await
    }

    async fn execute(
        &mut self,
        statement: &Statement,
        timeout: std::time::Duration,
    ) -> EngineResult<()> {
        self.inner().execute(statement, timeout).await
    }

    async fn close(mut self: Box<Self>) -> EngineResult<()> {
        match self.inner.take() {
            Some(inner) => inner.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for InstrumentedConnection {
    fn drop(&mut self) {
        if let Some(instance) = self.active.take() {
            self.probe.leave(&instance);
        }
    }
}

/// Usage repository whose writes always fail.
pub struct FailingUsageRepo;

#[async_trait]
impl UsageRepo for FailingUsageRepo {
    async fn touch_instance(
        &self,
        _full_instance_name: &str,
        _template_name: &str,
        _caller_id: &str,
        _accessed_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        Err(MetadataError::Internal("tracking store is down".to_string()))
    }

    async fn get_instance_usage(
        &self,
        _full_instance_name: &str,
    ) -> MetadataResult<Option<InstanceUsageRow>> {
        Ok(None)
    }

    async fn list_instance_usage(&self) -> MetadataResult<Vec<InstanceUsageRow>> {
        Ok(Vec::new())
    }
}

/// A provisioner wired to an instrumented in-memory engine and an in-memory
/// SQLite usage store.
pub struct TestProvisioner {
    pub provisioner: Arc<Provisioner>,
    pub engine: MemoryEngine,
    pub probe: Arc<ConcurrencyProbe>,
    pub store: Arc<SqliteStore>,
}

impl TestProvisioner {
    pub async fn new() -> Self {
        Self::build(MemoryEngine::default(), None).await
    }

    /// Provisioner whose usage tracking always fails.
    pub async fn with_failing_tracker() -> Self {
        Self::build(MemoryEngine::default(), Some(Arc::new(FailingUsageRepo))).await
    }

    pub async fn with_engine(engine: MemoryEngine) -> Self {
        Self::build(engine, None).await
    }

    async fn build(engine: MemoryEngine, repo: Option<Arc<dyn UsageRepo>>) -> Self {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let probe = Arc::new(ConcurrencyProbe::default());
        let instrumented = InstrumentedEngine {
            inner: engine.clone(),
            probe: probe.clone(),
        };

        let repo = repo.unwrap_or_else(|| store.clone() as Arc<dyn UsageRepo>);
        let provisioner = Provisioner::new(
            Arc::new(instrumented),
            Arc::new(InstanceLocks::new()),
            UsageTracker::new(repo),
            StrategyOptions::default(),
        );

        Self {
            provisioner: Arc::new(provisioner),
            engine,
            probe,
            store,
        }
    }

    pub async fn usage(&self, instance: &str) -> Option<InstanceUsageRow> {
        self.store.get_instance_usage(instance).await.unwrap()
    }
}
