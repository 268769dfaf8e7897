//! Server test utilities.

use dbprov_core::config::{AppConfig, MetadataConfig};
use dbprov_engine::MemoryEngine;
use dbprov_metadata::{MetadataStore, SqliteStore};
use dbprov_server::{AppState, create_router};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// API key accepted by [`AppConfig::for_testing`].
#[allow(dead_code)]
pub const TEST_API_KEY: &str = "test-api-key";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    /// Handle on the in-memory engine behind the router.
    pub engine: MemoryEngine,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server backed by the in-memory engine.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let db_path = temp_dir.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create metadata store"),
        );

        let mut config = AppConfig::for_testing();
        config.metadata = MetadataConfig::Sqlite { path: db_path };
        modifier(&mut config);

        dbprov_server::metrics::register_metrics();

        let engine = MemoryEngine::default();
        let state = AppState::new(
            config,
            Arc::new(engine.clone()),
            metadata,
            CancellationToken::new(),
        );
        let router = create_router(state.clone());

        Self {
            router,
            state,
            engine,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }
}
