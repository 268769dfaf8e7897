//! PostgreSQL-based metadata store implementation.

use crate::error::MetadataResult;
use crate::models::InstanceUsageRow;
use crate::repos::UsageRepo;
use crate::store::MetadataStore;
use async_trait::async_trait;
use dbprov_core::config::PgSslMode;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// Lets the password come from its own environment variable instead of
    /// being embedded in a URL.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UsageRepo for PostgresStore {
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
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (full_instance_name) DO UPDATE
            SET last_accessed_at = EXCLUDED.last_accessed_at
            "#,
        )
        .bind(full_instance_name)
        .bind(template_name)
        .bind(caller_id)
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
            "SELECT * FROM instance_usage WHERE full_instance_name = $1",
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_statements_skip_comment_only_chunks() {
        let statements = postgres_schema_statements(POSTGRES_SCHEMA);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("CREATE TABLE IF NOT EXISTS instance_usage"));
        assert!(statements[1].starts_with("CREATE INDEX"));
    }

    #[test]
    fn schema_statements_ignore_trailing_comments() {
        let schema = "CREATE TABLE a (id INT);\n-- trailing note\n";
        assert_eq!(postgres_schema_statements(schema), vec!["CREATE TABLE a (id INT)"]);
    }
}
