//! Metadata store test utilities.

use dbprov_metadata::{MetadataError, MetadataResult, MetadataStore, PostgresStore, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;

/// Stable prefix for Docker/container startup failures in Postgres test setup.
/// Tests use this marker to decide whether to skip due to unavailable Docker.
pub const POSTGRES_CONTAINER_START_ERR_PREFIX: &str = "postgres-container-start:";

/// A test metadata store wrapper that cleans up on drop.
#[allow(dead_code)]
pub struct TestMetadata {
    pub store: Arc<dyn MetadataStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestMetadata {
    /// Create a new file-backed SQLite store in a temporary directory.
    pub async fn new() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let store = SqliteStore::new(&db_path).await?;

        Ok(Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        })
    }

    /// Create a new in-memory SQLite store (faster for tests).
    pub async fn in_memory() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(":memory:").await?;

        Ok(Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        })
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }
}

/// PostgreSQL test metadata store wrapper that manages a testcontainer.
#[allow(dead_code)]
pub struct PostgresTestMetadata {
    pub store: Arc<dyn MetadataStore>,
    _container: ContainerAsync<Postgres>,
}

#[allow(dead_code)]
impl PostgresTestMetadata {
    /// Create a new PostgreSQL test store with a testcontainer.
    pub async fn new() -> MetadataResult<Self> {
        let container = Postgres::default()
            .with_tag("15-alpine")
            .start()
            .await
            .map_err(|e| {
                MetadataError::Internal(format!(
                    "{} Failed to start PostgreSQL container: {e}",
                    POSTGRES_CONTAINER_START_ERR_PREFIX
                ))
            })?;

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        // Default credentials from testcontainers-modules postgres
        let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
        let store = PostgresStore::from_url(&url, 5, None).await?;

        Ok(Self {
            store: Arc::new(store),
            _container: container,
        })
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }
}

/// Run a test against both SQLite and PostgreSQL backends.
///
/// PostgreSQL is skipped when `SKIP_POSTGRES_TESTS` is set or Docker is not
/// available.
#[allow(dead_code)]
pub async fn run_metadata_test_both<F, Fut>(test_fn: F)
where
    F: Fn(Arc<dyn MetadataStore>) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    let sqlite = TestMetadata::new()
        .await
        .expect("Failed to create SQLite test metadata");
    test_fn.clone()(sqlite.store()).await;

    if std::env::var("SKIP_POSTGRES_TESTS").is_err() {
        match PostgresTestMetadata::new().await {
            Ok(postgres) => {
                test_fn(postgres.store()).await;
            }
            Err(MetadataError::Internal(msg))
                if msg.starts_with(POSTGRES_CONTAINER_START_ERR_PREFIX) =>
            {
                eprintln!("Skipping PostgreSQL metadata tests: {msg}");
            }
            Err(err) => panic!("PostgreSQL test metadata setup failed: {err}"),
        }
    }
}
