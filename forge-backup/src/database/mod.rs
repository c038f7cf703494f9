//! Database adapters - one dump file per run, produced on backup and
//! applied on restore.
//!
//! The adapter is chosen from the source descriptor's `DB_TYPE`. Adding a
//! database kind means adding a [`DatabaseKind`] variant and one adapter;
//! the pipeline only ever sees `dyn DatabaseAdapter`.

mod connection;
mod mysql;
mod postgres;
mod process;
mod sqlite;

pub use connection::HostPort;
pub use mysql::MysqlAdapter;
pub use postgres::PostgresAdapter;
pub use sqlite::SqliteAdapter;

use crate::config::Settings;
use crate::source::SourceDescriptor;
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Mysql,
    Postgres,
    Sqlite3,
}

impl DatabaseKind {
    /// Fixed name of the dump artifact inside a staging tree.
    pub fn dump_file_name(self) -> &'static str {
        match self {
            DatabaseKind::Mysql => "dump.mysql.sql",
            DatabaseKind::Postgres => "dump.postgres.sql",
            DatabaseKind::Sqlite3 => "dump.sqlite3.db",
        }
    }
}

impl FromStr for DatabaseKind {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(DatabaseKind::Mysql),
            "postgres" => Ok(DatabaseKind::Postgres),
            "sqlite3" => Ok(DatabaseKind::Sqlite3),
            _ => Err(BackupError::UnsupportedDatabaseKind(s.to_string())),
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatabaseKind::Mysql => "mysql",
            DatabaseKind::Postgres => "postgres",
            DatabaseKind::Sqlite3 => "sqlite3",
        };
        f.write_str(name)
    }
}

/// Produces and applies a single dump artifact for one database engine.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    fn kind(&self) -> DatabaseKind;

    /// Write the dump into the backup staging tree.
    async fn backup(&self, settings: &Settings, source: &SourceDescriptor) -> Result<()>;

    /// Apply the dump found in the restore staging tree to the live database.
    async fn restore(&self, settings: &Settings, source: &SourceDescriptor) -> Result<()>;

    /// Dump location inside the backup staging tree.
    fn backup_dump_path(&self, settings: &Settings) -> PathBuf {
        settings.backup_staging.join(self.kind().dump_file_name())
    }

    /// Dump location inside the restore staging tree.
    fn restore_dump_path(&self, settings: &Settings) -> PathBuf {
        settings.restore_staging.join(self.kind().dump_file_name())
    }
}

/// Select the adapter for a raw `DB_TYPE` value.
pub fn adapter_for(kind: &str) -> Result<Box<dyn DatabaseAdapter>> {
    let adapter: Box<dyn DatabaseAdapter> = match kind.parse::<DatabaseKind>()? {
        DatabaseKind::Mysql => Box::new(MysqlAdapter),
        DatabaseKind::Postgres => Box::new(PostgresAdapter),
        DatabaseKind::Sqlite3 => Box::new(SqliteAdapter),
    };
    Ok(adapter)
}
