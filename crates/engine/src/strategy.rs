//! Provisioning strategies.
//!
//! Each strategy is a fixed sequence of administrative commands. A failing
//! step aborts the rest; partially restored files are left for the engine's
//! own DDL semantics to deal with.

use crate::error::{EngineError, EngineResult};
use crate::gateway::EngineConnection;
use crate::locator;
use crate::statement::{FileType, Statement, engine_directory, engine_join, separator_for};
use dbprov_core::config::RestoreConfig;
use dbprov_core::naming::backup_file_name;
use dbprov_core::{Identifier, InstanceName};
use std::time::Duration;

/// Knobs shared by the strategies.
#[derive(Clone, Debug)]
pub struct StrategyOptions {
    /// Directory holding template backups, as seen by the engine.
    pub backup_directory: Option<String>,
    pub restore_timeout: Duration,
    pub snapshot_timeout: Duration,
    pub reset_timeout: Duration,
    pub simple_recovery: bool,
}

impl StrategyOptions {
    pub fn from_config(config: &RestoreConfig) -> Self {
        Self {
            backup_directory: config.backup_directory.clone(),
            restore_timeout: config.restore_timeout(),
            snapshot_timeout: config.snapshot_timeout(),
            reset_timeout: config.reset_timeout(),
            simple_recovery: config.simple_recovery,
        }
    }

    /// Location of the template's backup file.
    pub fn backup_path(&self, template: &Identifier) -> String {
        let file = backup_file_name(template);
        match &self.backup_directory {
            Some(dir) => engine_join(dir, separator_for(dir), &file),
            None => file,
        }
    }
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self::from_config(&RestoreConfig::default())
    }
}

/// Default data and log directories of the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileLayout {
    data_directory: String,
    data_separator: char,
    log_directory: String,
    log_separator: char,
}

impl FileLayout {
    pub fn data_file(&self, file_name: &str) -> String {
        engine_join(&self.data_directory, self.data_separator, file_name)
    }

    pub fn log_file(&self, file_name: &str) -> String {
        engine_join(&self.log_directory, self.log_separator, file_name)
    }
}

/// Discover where the engine keeps data and log files by looking at the
/// first file of each type registered for `master`.
pub async fn discover_file_layout(conn: &mut dyn EngineConnection) -> EngineResult<FileLayout> {
    let (data_directory, data_separator) = file_directory(conn, FileType::Rows).await?;
    let (log_directory, log_separator) = file_directory(conn, FileType::Log).await?;
    Ok(FileLayout {
        data_directory,
        data_separator,
        log_directory,
        log_separator,
    })
}

async fn file_directory(
    conn: &mut dyn EngineConnection,
    file_type: FileType,
) -> EngineResult<(String, char)> {
    let statement = Statement::default_file_path(file_type);
    let path = conn
        .query_scalar(&statement)
        .await?
        .ok_or_else(|| {
            EngineError::Configuration(format!(
                "could not determine {file_type} directory: no {file_type} file registered for master"
            ))
        })?
        .into_text(statement.operation())?;

    let (dir, sep) = engine_directory(&path).ok_or_else(|| {
        EngineError::Configuration(format!(
            "could not resolve {file_type} directory from '{path}'"
        ))
    })?;
    Ok((dir.to_string(), sep))
}

/// Restore the template backup into a new instance and snapshot it.
pub async fn create_from_backup(
    conn: &mut dyn EngineConnection,
    template: &Identifier,
    instance: &InstanceName,
    options: &StrategyOptions,
) -> EngineResult<()> {
    let layout = discover_file_layout(conn).await?;
    let snapshot = instance.snapshot();

    let backup_file = options.backup_path(template);
    let data_file = layout.data_file(&format!("{instance}.mdf"));
    let log_file = layout.log_file(&format!("{instance}.ldf"));
    let snapshot_file = layout.data_file(&format!("{snapshot}.ss"));

    tracing::info!(
        instance = %instance,
        backup = %backup_file,
        data_file = %data_file,
        log_file = %log_file,
        "Restoring instance from backup"
    );
    let restore = Statement::restore_backup(
        template,
        instance,
        &backup_file,
        &data_file,
        &log_file,
        options.simple_recovery,
    );
    conn.execute(&restore, options.restore_timeout).await?;

    tracing::info!(instance = %instance, snapshot = %snapshot, "Creating snapshot");
    let create_snapshot = Statement::create_snapshot(template, instance, &snapshot_file);
    conn.execute(&create_snapshot, options.snapshot_timeout).await?;

    Ok(())
}

/// Revert an existing instance to its snapshot.
///
/// Fails with [`EngineError::SnapshotNotFound`] when the instance has no
/// snapshot; it never falls back to a backup restore.
pub async fn reset_from_snapshot(
    conn: &mut dyn EngineConnection,
    instance: &InstanceName,
    options: &StrategyOptions,
) -> EngineResult<()> {
    let snapshot = instance.snapshot();
    if !locator::snapshot_exists(conn, &snapshot).await? {
        return Err(EngineError::SnapshotNotFound(snapshot.to_string()));
    }

    // The engine refuses to restore over a database with open sessions.
    let terminate = Statement::terminate_sessions(instance);
    match conn.execute(&terminate, options.reset_timeout).await {
        Ok(()) => {}
        Err(EngineError::Command { message, .. }) => {
            tracing::warn!(
                instance = %instance,
                error = %message,
                "Failed to terminate sessions, attempting restore anyway"
            );
        }
        Err(e) => return Err(e),
    }

    tracing::info!(instance = %instance, snapshot = %snapshot, "Restoring instance from snapshot");
    conn.execute(
        &Statement::revert_to_snapshot(instance),
        options.reset_timeout,
    )
    .await
}
