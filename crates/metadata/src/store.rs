//! Metadata store trait and the SQLite implementation.

use crate::error::MetadataResult;
use crate::models::InstanceUsageRow;
use crate::repos::UsageRepo;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: UsageRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store. `":memory:"` opens a private in-memory database.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();
        let in_memory = path.as_os_str() == ":memory:";

        let opts = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        };
        // Prevent transient "database is locked" errors under concurrent access.
        let opts = opts.busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers (and keeps an in-memory
            // database alive for the lifetime of the pool).
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UsageRepo for SqliteStore {
    async fn touch_instance(
        &self,
        full_instance_name: &str,
        template_name: &str,
        caller_id: &str,
        accessed_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO instance_usage
                (full_instance_name, template_name, caller_id, first_provisioned_at, last_accessed_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(full_instance_name) DO UPDATE
            SET last_accessed_at = excluded.last_accessed_at
            "#,
        )
        .bind(full_instance_name)
        .bind(template_name)
        .bind(caller_id)
        .bind(accessed_at)
        .bind(accessed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_instance_usage(
        &self,
        full_instance_name: &str,
    ) -> MetadataResult<Option<InstanceUsageRow>> {
        let row = sqlx::query_as::<_, InstanceUsageRow>(
            "SELECT * FROM instance_usage WHERE full_instance_name = ?",
        )
        .bind(full_instance_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_instance_usage(&self) -> MetadataResult<Vec<InstanceUsageRow>> {
        let rows = sqlx::query_as::<_, InstanceUsageRow>(
            "SELECT * FROM instance_usage ORDER BY last_accessed_at DESC, full_instance_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS instance_usage (
    full_instance_name TEXT PRIMARY KEY,
    template_name TEXT NOT NULL,
    caller_id TEXT NOT NULL,
    first_provisioned_at TEXT NOT NULL,
    last_accessed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_instance_usage_template ON instance_usage(template_name);
"#;
