//! Administrative statement construction.
//!
//! Statements that name databases or files cannot bind those names as
//! parameters, so the text is assembled here from validated
//! [`Identifier`]s and engine-reported paths. Bracketed identifiers escape
//! `]` and `N'..'` literals escape `'` on top of the identifier allow-list.

use dbprov_core::{Identifier, InstanceName, SnapshotName};
use std::fmt;

/// Kind of database file recorded in the engine catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    /// Data ("ROWS") file.
    Rows,
    /// Transaction log file.
    Log,
}

impl FileType {
    /// Catalog `type_desc` value.
    pub fn type_desc(self) -> &'static str {
        match self {
            Self::Rows => "ROWS",
            Self::Log => "LOG",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_desc())
    }
}

/// What a statement does, independent of its SQL text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatementKind {
    /// Connectivity probe.
    Ping,
    /// Existence probe for a database or snapshot by name.
    DatabaseId { name: String },
    /// Physical path of the first file of the given type in `master`.
    DefaultFilePath { file_type: FileType },
    /// Restore a template backup into an instance.
    RestoreBackup {
        template: Identifier,
        instance: InstanceName,
        backup_file: String,
        data_file: String,
        log_file: String,
    },
    /// Create the snapshot of a freshly restored instance.
    CreateSnapshot {
        instance: InstanceName,
        snapshot: SnapshotName,
        snapshot_file: String,
    },
    /// Kill every other session connected to an instance.
    TerminateSessions { instance: InstanceName },
    /// Revert an instance to its snapshot.
    RevertToSnapshot {
        instance: InstanceName,
        snapshot: SnapshotName,
    },
}

impl StatementKind {
    /// Short operation label for logs and errors.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::DatabaseId { .. } => "database lookup",
            Self::DefaultFilePath { .. } => "file path lookup",
            Self::RestoreBackup { .. } => "restore from backup",
            Self::CreateSnapshot { .. } => "snapshot creation",
            Self::TerminateSessions { .. } => "session termination",
            Self::RevertToSnapshot { .. } => "restore from snapshot",
        }
    }
}

/// Rendered statement: SQL text, positional parameters (`@P1`, ...) and kind.
#[derive(Clone, Debug)]
pub struct Statement {
    kind: StatementKind,
    sql: String,
    params: Vec<String>,
}

impl Statement {
    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn operation(&self) -> &'static str {
        self.kind.operation()
    }

    /// `SELECT 1`.
    pub fn ping() -> Self {
        Self {
            kind: StatementKind::Ping,
            sql: "SELECT 1".to_string(),
            params: Vec::new(),
        }
    }

    /// `SELECT DB_ID(@P1)`: NULL when no database of that name exists.
    pub fn database_id(name: &str) -> Self {
        Self {
            kind: StatementKind::DatabaseId {
                name: name.to_string(),
            },
            sql: "SELECT DB_ID(@P1)".to_string(),
            params: vec![name.to_string()],
        }
    }

    /// First physical file of a type in `master`, ordered by file id.
    pub fn default_file_path(file_type: FileType) -> Self {
        Self {
            kind: StatementKind::DefaultFilePath { file_type },
            sql: "SELECT TOP 1 physical_name FROM master.sys.master_files \
                  WHERE database_id = DB_ID(N'master') AND type_desc = @P1 \
                  ORDER BY file_id"
                .to_string(),
            params: vec![file_type.type_desc().to_string()],
        }
    }

    /// Restore `{template}.bak` into the instance, relocating its files, then
    /// open it read-write.
    pub fn restore_backup(
        template: &Identifier,
        instance: &InstanceName,
        backup_file: &str,
        data_file: &str,
        log_file: &str,
        simple_recovery: bool,
    ) -> Self {
        let db = quote_ident(instance.as_str());
        let mut sql = format!(
            "RESTORE DATABASE {db} FROM DISK = {backup}\n\
             WITH REPLACE, NOUNLOAD,\n\
             MOVE {data_name} TO {data},\n\
             MOVE {log_name} TO {log};\n\
             ALTER DATABASE {db} SET READ_WRITE WITH NO_WAIT;",
            backup = quote_literal(backup_file),
            data_name = quote_literal(template.as_str()),
            data = quote_literal(data_file),
            log_name = quote_literal(&format!("{template}_log")),
            log = quote_literal(log_file),
        );
        if simple_recovery {
            sql.push_str(&format!("\nALTER DATABASE {db} SET RECOVERY SIMPLE;"));
        }
        Self {
            kind: StatementKind::RestoreBackup {
                template: template.clone(),
                instance: instance.clone(),
                backup_file: backup_file.to_string(),
                data_file: data_file.to_string(),
                log_file: log_file.to_string(),
            },
            sql,
            params: Vec::new(),
        }
    }

    /// Create the instance's snapshot. The snapshot maps the template's
    /// logical data file name onto a sparse file.
    pub fn create_snapshot(
        template: &Identifier,
        instance: &InstanceName,
        snapshot_file: &str,
    ) -> Self {
        let snapshot = instance.snapshot();
        let sql = format!(
            "CREATE DATABASE {snap} ON (NAME = {logical}, FILENAME = {file})\n\
             AS SNAPSHOT OF {db};",
            snap = quote_ident(snapshot.as_str()),
            logical = quote_ident(template.as_str()),
            file = quote_literal(snapshot_file),
            db = quote_ident(instance.as_str()),
        );
        Self {
            kind: StatementKind::CreateSnapshot {
                instance: instance.clone(),
                snapshot,
                snapshot_file: snapshot_file.to_string(),
            },
            sql,
            params: Vec::new(),
        }
    }

    /// Kill every session on the instance except our own.
    pub fn terminate_sessions(instance: &InstanceName) -> Self {
        let sql = "DECLARE @kill nvarchar(max) = N'';\n\
                   SELECT @kill = @kill + N'KILL ' + CONVERT(nvarchar(10), session_id) + N';'\n\
                   FROM sys.dm_exec_sessions\n\
                   WHERE database_id = DB_ID(@P1) AND session_id <> @@SPID;\n\
                   EXEC sp_executesql @kill;"
            .to_string();
        Self {
            kind: StatementKind::TerminateSessions {
                instance: instance.clone(),
            },
            sql,
            params: vec![instance.as_str().to_string()],
        }
    }

    /// Revert the instance to the state captured in its snapshot.
    pub fn revert_to_snapshot(instance: &InstanceName) -> Self {
        let snapshot = instance.snapshot();
        let sql = format!(
            "RESTORE DATABASE {db} FROM DATABASE_SNAPSHOT = {snap};",
            db = quote_ident(instance.as_str()),
            snap = quote_literal(snapshot.as_str()),
        );
        Self {
            kind: StatementKind::RevertToSnapshot {
                instance: instance.clone(),
                snapshot,
            },
            sql,
            params: Vec::new(),
        }
    }
}

/// Quote an identifier as `[name]`, doubling any `]`.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Quote a Unicode string literal as `N'value'`, doubling any `'`.
pub fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// Directory part of a path reported by the engine.
///
/// The engine may run on Windows while this service runs elsewhere, so both
/// `\` and `/` are treated as separators. Returns the directory and the
/// separator it uses, or `None` when the path has no directory component.
pub fn engine_directory(physical_path: &str) -> Option<(&str, char)> {
    let idx = physical_path.rfind(['\\', '/'])?;
    let sep = physical_path[idx..].chars().next()?;
    let dir = &physical_path[..idx];
    if dir.is_empty() && sep == '\\' {
        return None;
    }
    // Keep the root for paths like "/master.mdf".
    Some((if dir.is_empty() { "/" } else { dir }, sep))
}

/// Join a file name onto an engine directory using the given separator.
pub fn engine_join(directory: &str, sep: char, file_name: &str) -> String {
    if directory.ends_with(['\\', '/']) {
        format!("{directory}{file_name}")
    } else {
        format!("{directory}{sep}{file_name}")
    }
}

/// Separator to use for a configured directory: whichever it already contains.
pub fn separator_for(directory: &str) -> char {
    if directory.contains('\\') { '\\' } else { '/' }
}
