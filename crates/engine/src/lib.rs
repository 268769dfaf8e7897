//! Database engine gateway and provisioning strategies for dbprov.
//!
//! This crate owns everything that talks to the engine:
//! - The gateway traits ([`Engine`], [`EngineConnection`])
//! - SQL Server and in-memory gateway implementations
//! - Administrative statement construction
//! - Instance state probes
//! - The create-from-backup and reset-from-snapshot strategies

pub mod error;
pub mod gateway;
pub mod locator;
pub mod memory;
pub mod mssql;
pub mod statement;
pub mod strategy;

pub use error::{EngineError, EngineResult};
pub use gateway::{Engine, EngineConnection, ScalarValue};
pub use memory::MemoryEngine;
pub use mssql::SqlServerEngine;
pub use statement::{Statement, StatementKind};
pub use strategy::StrategyOptions;

use dbprov_core::config::EngineConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create an engine gateway from configuration.
pub fn from_config(config: &EngineConfig) -> EngineResult<Arc<dyn Engine>> {
    match config {
        EngineConfig::SqlServer {
            connection_string,
            host,
            port,
            username,
            password,
            database,
            trust_server_certificate,
            connect_timeout_secs,
        } => {
            let connect_timeout = Duration::from_secs(*connect_timeout_secs);
            let engine = if let Some(connection_string) = connection_string {
                // Connection string takes precedence over individual fields
                SqlServerEngine::from_connection_string(connection_string, connect_timeout)?
            } else if let (Some(host), Some(username), Some(password)) =
                (host.as_ref(), username.as_ref(), password.as_ref())
            {
                SqlServerEngine::from_params(
                    host,
                    *port,
                    username,
                    password,
                    database,
                    *trust_server_certificate,
                    connect_timeout,
                )
            } else {
                return Err(EngineError::Configuration(
                    "sqlserver config requires either 'connection_string' or 'host' + 'username' + 'password'"
                        .to_string(),
                ));
            };
            Ok(Arc::new(engine) as Arc<dyn Engine>)
        }
        EngineConfig::Memory {
            data_directory,
            log_directory,
        } => {
            tracing::warn!(
                "Using the in-memory engine: databases are simulated and nothing is restored. \
                 Use the sqlserver engine for real deployments."
            );
            let engine = MemoryEngine::new(data_directory.clone(), log_directory.clone());
            Ok(Arc::new(engine) as Arc<dyn Engine>)
        }
    }
}
