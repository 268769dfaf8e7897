//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, ensure this endpoint is network-restricted
    /// to authorized Prometheus scraper IPs only at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// API key configuration.
///
/// Every provisioning request must carry the shared secret in the
/// `X-Api-Key` header. Only its SHA-256 digest is kept in configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// SHA256 hex digest of the API key (64 characters).
    /// Generate with: `echo -n "your-api-key" | sha256sum`
    pub api_key_hash: String,
}

impl AuthConfig {
    /// Create a test configuration.
    ///
    /// **For testing only.** Accepts the API key `test-api-key`.
    pub fn for_testing() -> Self {
        Self {
            // SHA256 of "test-api-key"
            api_key_hash: "4c806362b613f7496abf284146efd31da90e4b16169fe001841ca17290f427c4"
                .to_string(),
        }
    }

    /// Validate that the configured digest is well formed.
    pub fn validate(&self) -> Result<(), String> {
        let hash = self.api_key_hash.trim();
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(
                "auth.api_key_hash must be a 64 character SHA256 hex digest".to_string(),
            );
        }
        Ok(())
    }
}

/// Database engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EngineConfig {
    /// Microsoft SQL Server reached over TDS.
    SqlServer {
        /// ADO.NET style connection string
        /// (e.g., "server=tcp:localhost,1433;user=sa;password=...;TrustServerCertificate=true").
        /// Takes precedence over individual fields if both are provided.
        connection_string: Option<String>,
        /// Server host.
        host: Option<String>,
        /// Server port (default: 1433).
        #[serde(default = "default_sqlserver_port")]
        port: u16,
        /// SQL login name.
        username: Option<String>,
        /// SQL login password.
        /// WARNING: Prefer DBPROV_ENGINE__PASSWORD env var over storing in config.
        password: Option<String>,
        /// Database the administrative connection opens (default: master).
        #[serde(default = "default_sqlserver_database")]
        database: String,
        /// Accept the server certificate without validation.
        #[serde(default)]
        trust_server_certificate: bool,
        /// Timeout for establishing a connection in seconds.
        #[serde(default = "default_connect_timeout_secs")]
        connect_timeout_secs: u64,
    },
    /// Simulated engine that keeps its catalog in memory.
    /// Intended for local development and tests; nothing is restored.
    Memory {
        /// Directory reported as the engine's default data file location.
        #[serde(default = "default_memory_data_directory")]
        data_directory: String,
        /// Directory reported as the engine's default log file location.
        #[serde(default = "default_memory_log_directory")]
        log_directory: String,
    },
}

fn default_sqlserver_port() -> u16 {
    1433
}

fn default_sqlserver_database() -> String {
    "master".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_memory_data_directory() -> String {
    "/var/opt/mssql/data".to_string()
}

fn default_memory_log_directory() -> String {
    "/var/opt/mssql/log".to_string()
}

impl EngineConfig {
    /// In-memory engine with its default directories.
    pub fn memory() -> Self {
        Self::Memory {
            data_directory: default_memory_data_directory(),
            log_directory: default_memory_log_directory(),
        }
    }

    /// Validate engine configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            EngineConfig::SqlServer {
                connection_string,
                host,
                username,
                password,
                ..
            } => match (connection_string.as_ref(), host.as_ref()) {
                (Some(_), _) => Ok(()),
                (None, None) => Err(
                    "sqlserver config requires either 'connection_string' or 'host'".to_string(),
                ),
                (None, Some(_)) => match (username.as_ref(), password.as_ref()) {
                    (Some(_), Some(_)) => Ok(()),
                    _ => Err(
                        "sqlserver config requires 'username' and 'password' when using 'host'"
                            .to_string(),
                    ),
                },
            },
            EngineConfig::Memory {
                data_directory,
                log_directory,
            } => {
                if data_directory.is_empty() || log_directory.is_empty() {
                    return Err("memory engine requires non-empty file directories".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Restore and snapshot behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Directory holding `{template}.bak` files, as seen by the engine.
    /// When unset the engine resolves the bare file name against its
    /// default backup directory.
    #[serde(default)]
    pub backup_directory: Option<String>,
    /// Timeout for restoring a backup in seconds (default: 300).
    #[serde(default = "default_restore_timeout_secs")]
    pub restore_timeout_secs: u64,
    /// Timeout for creating a snapshot in seconds (default: 120).
    #[serde(default = "default_snapshot_timeout_secs")]
    pub snapshot_timeout_secs: u64,
    /// Timeout for reverting to a snapshot in seconds (default: 120).
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
    /// Switch restored instances to the SIMPLE recovery model.
    #[serde(default)]
    pub simple_recovery: bool,
}

fn default_restore_timeout_secs() -> u64 {
    300 // 5 minutes, backups can be large
}

fn default_snapshot_timeout_secs() -> u64 {
    120
}

fn default_reset_timeout_secs() -> u64 {
    120
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            backup_directory: None,
            restore_timeout_secs: default_restore_timeout_secs(),
            snapshot_timeout_secs: default_snapshot_timeout_secs(),
            reset_timeout_secs: default_reset_timeout_secs(),
            simple_recovery: false,
        }
    }
}

impl RestoreConfig {
    pub fn restore_timeout(&self) -> Duration {
        Duration::from_secs(self.restore_timeout_secs)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_secs)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }

    /// Validate restore configuration.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("restore_timeout_secs", self.restore_timeout_secs),
            ("snapshot_timeout_secs", self.snapshot_timeout_secs),
            ("reset_timeout_secs", self.reset_timeout_secs),
        ] {
            if value == 0 {
                return Err(format!("restore.{name} cannot be 0"));
            }
        }
        if let Some(dir) = &self.backup_directory {
            if dir.contains('\'') {
                return Err("restore.backup_directory must not contain quotes".to_string());
            }
        }
        Ok(())
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (recommended for single-node deployments).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host (e.g., "localhost" or "db.example.com").
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer DBPROV_METADATA__PASSWORD env var over storing in config.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds (prevents hung queries).
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => Err(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ),
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// API key configuration (required).
    pub auth: AuthConfig,
    /// Database engine configuration (required).
    pub engine: EngineConfig,
    /// Restore and snapshot behaviour.
    #[serde(default)]
    pub restore: RestoreConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses the in-memory engine, SQLite metadata
    /// and the `test-api-key` API key.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::for_testing(),
            engine: EngineConfig::memory(),
            restore: RestoreConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }

    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.auth.validate()?;
        self.engine.validate()?;
        self.restore.validate()?;
        self.metadata.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_config_defaults() {
        let config = RestoreConfig::default();
        assert_eq!(config.restore_timeout(), Duration::from_secs(300));
        assert_eq!(config.snapshot_timeout(), Duration::from_secs(120));
        assert_eq!(config.reset_timeout(), Duration::from_secs(120));
        assert!(config.backup_directory.is_none());
        assert!(!config.simple_recovery);
    }

    #[test]
    fn test_restore_config_rejects_zero_timeout() {
        let config = RestoreConfig {
            snapshot_timeout_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("snapshot_timeout_secs"));
    }

    #[test]
    fn test_engine_config_sqlserver_deserialize_defaults() {
        let json = r#"{"type":"sqlserver","host":"db","username":"sa","password":"pw"}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        match &config {
            EngineConfig::SqlServer {
                port,
                database,
                trust_server_certificate,
                connect_timeout_secs,
                ..
            } => {
                assert_eq!(*port, 1433);
                assert_eq!(database, "master");
                assert!(!trust_server_certificate);
                assert_eq!(*connect_timeout_secs, 30);
            }
            _ => panic!("expected sqlserver config"),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_config_sqlserver_requires_connection_info() {
        let json = r#"{"type":"sqlserver"}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"{"type":"sqlserver","host":"db"}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().unwrap_err().contains("username"));

        let json = r#"{"type":"sqlserver","connection_string":"server=tcp:db,1433"}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_auth_config_validates_digest() {
        assert!(AuthConfig::for_testing().validate().is_ok());
        let bad = AuthConfig {
            api_key_hash: "not-a-hash".to_string(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_app_config_for_testing_is_valid() {
        let config = AppConfig::for_testing();
        assert!(config.validate().is_ok());
        assert!(matches!(config.engine, EngineConfig::Memory { .. }));
        assert!(config.server.metrics_enabled);
    }

    #[test]
    fn test_app_config_requires_auth_section() {
        let json = r#"{"server":{"bind":"0.0.0.0:9000"}}"#;
        assert!(serde_json::from_str::<AppConfig>(json).is_err());
    }
}
