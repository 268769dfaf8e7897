//! In-memory engine gateway.
//!
//! Simulates the catalog side of provisioning: which databases and
//! snapshots exist, and the errors the real engine raises for missing or
//! duplicate names. Used for local development and throughout the tests.

use crate::error::{EngineError, EngineResult};
use crate::gateway::{Engine, EngineConnection, ScalarValue};
use crate::statement::{FileType, Statement, StatementKind, engine_join};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
struct DatabaseEntry {
    id: i64,
    /// Source database when this entry is a snapshot.
    snapshot_of: Option<String>,
}

#[derive(Debug, Default)]
struct Catalog {
    databases: BTreeMap<String, DatabaseEntry>,
    next_id: i64,
    executed: Vec<StatementKind>,
    injected_failures: HashMap<&'static str, String>,
}

impl Catalog {
    fn insert(&mut self, name: &str, snapshot_of: Option<String>) {
        self.next_id += 1;
        let id = self.next_id + 4; // ids 1-4 belong to system databases
        self.databases
            .insert(name.to_string(), DatabaseEntry { id, snapshot_of });
    }
}

struct Shared {
    catalog: Mutex<Catalog>,
    data_directory: String,
    log_directory: String,
    available: AtomicBool,
    open_connections: AtomicUsize,
    latency: Mutex<Duration>,
}

impl Shared {
    fn catalog(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn latency(&self) -> Duration {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Engine gateway backed by an in-memory catalog.
#[derive(Clone)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new("/var/opt/mssql/data", "/var/opt/mssql/log")
    }
}

impl MemoryEngine {
    /// Create an engine whose `master` files live in the given directories.
    /// An empty directory makes the engine report bare file names, the way a
    /// misconfigured catalog would.
    pub fn new(data_directory: impl Into<String>, log_directory: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                catalog: Mutex::new(Catalog::default()),
                data_directory: data_directory.into(),
                log_directory: log_directory.into(),
                available: AtomicBool::new(true),
                open_connections: AtomicUsize::new(0),
                latency: Mutex::new(Duration::ZERO),
            }),
        }
    }

    /// Delay applied to every executed command.
    pub fn set_latency(&self, latency: Duration) {
        *self.shared.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Make the engine refuse (or accept again) new connections.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Register a database that was created outside of provisioning.
    pub fn attach_database(&self, name: &str) {
        self.shared.catalog().insert(name, None);
    }

    /// Drop a database or snapshot outside of provisioning.
    pub fn drop_database(&self, name: &str) -> bool {
        self.shared.catalog().databases.remove(name).is_some()
    }

    pub fn database_exists(&self, name: &str) -> bool {
        self.shared.catalog().databases.contains_key(name)
    }

    /// Make the next command with the given operation label fail.
    pub fn fail_next(&self, operation: &'static str, message: impl Into<String>) {
        self.shared
            .catalog()
            .injected_failures
            .insert(operation, message.into());
    }

    /// Commands executed so far, in order. Probes are not recorded.
    pub fn executed(&self) -> Vec<StatementKind> {
        self.shared.catalog().executed.clone()
    }

    /// Number of connections opened and not yet closed or dropped.
    pub fn open_connections(&self) -> usize {
        self.shared.open_connections.load(Ordering::SeqCst)
    }

    fn master_file(&self, file_type: FileType) -> String {
        let (dir, name) = match file_type {
            FileType::Rows => (&self.shared.data_directory, "master.mdf"),
            FileType::Log => (&self.shared.log_directory, "mastlog.ldf"),
        };
        if dir.is_empty() {
            name.to_string()
        } else {
            engine_join(dir, '/', name)
        }
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn connect(&self) -> EngineResult<Box<dyn EngineConnection>> {
        if !self.shared.available.load(Ordering::SeqCst) {
            return Err(EngineError::Connection(
                "memory engine is unavailable".to_string(),
            ));
        }
        self.shared.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            engine: self.clone(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryConnection {
    engine: MemoryEngine,
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.engine
            .shared
            .open_connections
            .fetch_sub(1, Ordering::SeqCst);
    }
}

fn command_error(operation: &'static str, message: impl Into<String>) -> EngineError {
    EngineError::Command {
        operation,
        message: message.into(),
    }
}

impl MemoryConnection {
    fn apply(&self, kind: &StatementKind) -> EngineResult<()> {
        let operation = kind.operation();
        let mut catalog = self.engine.shared.catalog();

        if let Some(message) = catalog.injected_failures.remove(operation) {
            return Err(command_error(operation, message));
        }

        match kind {
            StatementKind::Ping
            | StatementKind::DatabaseId { .. }
            | StatementKind::DefaultFilePath { .. } => return Ok(()),
            StatementKind::RestoreBackup { instance, .. } => {
                // WITH REPLACE overwrites whatever is there.
                catalog.insert(instance.as_str(), None);
            }
            StatementKind::CreateSnapshot {
                instance, snapshot, ..
            } => {
                if !catalog.databases.contains_key(instance.as_str()) {
                    return Err(command_error(
                        operation,
                        format!("database '{instance}' does not exist"),
                    ));
                }
                if catalog.databases.contains_key(snapshot.as_str()) {
                    return Err(command_error(
                        operation,
                        format!("database '{snapshot}' already exists"),
                    ));
                }
                catalog.insert(snapshot.as_str(), Some(instance.as_str().to_string()));
            }
            StatementKind::TerminateSessions { .. } => {}
            StatementKind::RevertToSnapshot { instance, snapshot } => {
                let source = catalog
                    .databases
                    .get(snapshot.as_str())
                    .and_then(|entry| entry.snapshot_of.clone());
                if source.as_deref() != Some(instance.as_str()) {
                    return Err(command_error(
                        operation,
                        format!("'{snapshot}' is not a snapshot of '{instance}'"),
                    ));
                }
            }
        }

        catalog.executed.push(kind.clone());
        Ok(())
    }
}

#[async_trait]
impl EngineConnection for MemoryConnection {
    async fn query_scalar(&mut self, statement: &Statement) -> EngineResult<Option<ScalarValue>> {
        let operation = statement.operation();
        if let Some(message) = self
            .engine
            .shared
            .catalog()
            .injected_failures
            .remove(operation)
        {
            return Err(command_error(operation, message));
        }

        match statement.kind() {
            StatementKind::Ping => Ok(Some(ScalarValue::Int(1))),
            StatementKind::DatabaseId { name } => Ok(self
                .engine
                .shared
                .catalog()
                .databases
                .get(name)
                .map(|entry| ScalarValue::Int(entry.id))),
            StatementKind::DefaultFilePath { file_type } => {
                Ok(Some(ScalarValue::Text(self.engine.master_file(*file_type))))
            }
            other => Err(EngineError::UnexpectedResult {
                operation,
                message: format!("{other:?} does not return a value"),
            }),
        }
    }

    async fn execute(&mut self, statement: &Statement, timeout: Duration) -> EngineResult<()> {
        let latency = self.engine.shared.latency();
        if !latency.is_zero() {
            if latency > timeout {
                tokio::time::sleep(timeout).await;
                return Err(EngineError::Timeout {
                    operation: statement.operation(),
                    timeout,
                });
            }
            tokio::time::sleep(latency).await;
        }
        self.apply(statement.kind())
    }

    async fn close(self: Box<Self>) -> EngineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbprov_core::InstanceName;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn database_id_reflects_catalog() {
        let engine = MemoryEngine::default();
        let mut conn = engine.connect().await.unwrap();

        let probe = Statement::database_id("orders_ci-1");
        assert_eq!(conn.query_scalar(&probe).await.unwrap(), None);

        engine.attach_database("orders_ci-1");
        assert!(matches!(
            conn.query_scalar(&probe).await.unwrap(),
            Some(ScalarValue::Int(id)) if id > 4
        ));
    }

    #[tokio::test]
    async fn snapshot_requires_existing_source() {
        let engine = MemoryEngine::default();
        let (template, _, instance) = InstanceName::resolve("orders", "ci-1").unwrap();
        let mut conn = engine.connect().await.unwrap();

        let create = Statement::create_snapshot(&template, &instance, "/data/x.ss");
        let err = conn.execute(&create, TIMEOUT).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        engine.attach_database(instance.as_str());
        conn.execute(&create, TIMEOUT).await.unwrap();
        assert!(engine.database_exists(instance.snapshot().as_str()));

        let err = conn.execute(&create, TIMEOUT).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn revert_requires_snapshot_of_instance() {
        let engine = MemoryEngine::default();
        let (_, _, instance) = InstanceName::resolve("orders", "ci-1").unwrap();
        engine.attach_database(instance.as_str());
        let mut conn = engine.connect().await.unwrap();

        let revert = Statement::revert_to_snapshot(&instance);
        assert!(conn.execute(&revert, TIMEOUT).await.is_err());
        assert!(engine.executed().is_empty());
    }

    #[tokio::test]
    async fn reports_master_file_locations() {
        let engine = MemoryEngine::new("/srv/data", "");
        let mut conn = engine.connect().await.unwrap();

        let rows = conn
            .query_scalar(&Statement::default_file_path(FileType::Rows))
            .await
            .unwrap();
        assert_eq!(rows, Some(ScalarValue::Text("/srv/data/master.mdf".to_string())));

        let log = conn
            .query_scalar(&Statement::default_file_path(FileType::Log))
            .await
            .unwrap();
        assert_eq!(log, Some(ScalarValue::Text("mastlog.ldf".to_string())));
    }

    #[tokio::test]
    async fn tracks_open_connections_and_availability() {
        let engine = MemoryEngine::default();
        let conn = engine.connect().await.unwrap();
        assert_eq!(engine.open_connections(), 1);
        conn.close().await.unwrap();
        assert_eq!(engine.open_connections(), 0);

        engine.set_available(false);
        assert!(matches!(
            engine.connect().await.err(),
            Some(EngineError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let engine = MemoryEngine::default();
        engine.fail_next("ping", "boom");
        assert!(engine.health_check().await.is_err());
        assert!(engine.health_check().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn latency_beyond_timeout_is_reported_as_timeout() {
        let engine = MemoryEngine::default();
        engine.set_latency(Duration::from_secs(10));
        let (_, _, instance) = InstanceName::resolve("orders", "ci-1").unwrap();
        let mut conn = engine.connect().await.unwrap();

        let err = conn
            .execute(&Statement::terminate_sessions(&instance), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout { operation: "session termination", .. }));
    }
}
