//! SQLite - the dump is a byte-for-byte copy of the database file.

use super::{DatabaseAdapter, DatabaseKind};
use crate::config::Settings;
use crate::source::{DatabaseSource, SourceDescriptor};
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

pub struct SqliteAdapter;

impl SqliteAdapter {
    fn database_path(db: &DatabaseSource) -> Result<PathBuf> {
        if db.path.trim().is_empty() {
            return Err(BackupError::SourceNotFound(
                "SQLite database path not configured".to_string(),
            ));
        }
        Ok(PathBuf::from(&db.path))
    }
}

async fn require_file(path: &Path, what: &str) -> Result<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(BackupError::SourceNotFound(format!("{} is not a file: {}", what, path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BackupError::SourceNotFound(format!(
            "{} does not exist: {}",
            what,
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Sqlite3
    }

    async fn backup(&self, settings: &Settings, source: &SourceDescriptor) -> Result<()> {
        let database = Self::database_path(&source.database)?;
        require_file(&database, "SQLite database file").await?;

        let output = self.backup_dump_path(settings);
        debug!("Copying SQLite database from {} to {}", database.display(), output.display());
        fs::copy(&database, &output).await?;

        info!("SQLite database backup completed");
        Ok(())
    }

    async fn restore(&self, settings: &Settings, source: &SourceDescriptor) -> Result<()> {
        let target = Self::database_path(&source.database)?;
        let input = self.restore_dump_path(settings);
        require_file(&input, "SQLite backup file").await?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        if fs::try_exists(&target).await? {
            fs::remove_file(&target).await?;
        }

        debug!("Copying SQLite database from {} to {}", input.display(), target.display());
        fs::copy(&input, &target).await?;

        info!("SQLite database restore completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use chrono::Local;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn settings(root: &Path) -> Settings {
        let vars: HashMap<String, String> = [
            ("BACKUP_TMP_FOLDER", root.join("backup")),
            ("RESTORE_TMP_FOLDER", root.join("restore")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string_lossy().to_string()))
        .collect();
        Settings::from_vars(vars, Local::now()).unwrap()
    }

    fn source(path: &str) -> SourceDescriptor {
        SourceDescriptor {
            database: DatabaseSource {
                kind: "sqlite3".to_string(),
                path: path.to_string(),
                ..DatabaseSource::default()
            },
            ..SourceDescriptor::default()
        }
    }

    #[tokio::test]
    async fn test_empty_path_fails_before_touching_staging() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path());

        let backup = SqliteAdapter.backup(&settings, &source("")).await;
        let restore = SqliteAdapter.restore(&settings, &source("")).await;

        assert!(matches!(backup, Err(BackupError::SourceNotFound(_))));
        assert!(matches!(restore, Err(BackupError::SourceNotFound(_))));
        assert!(!settings.backup_staging.exists());
        assert!(!settings.restore_staging.exists());
    }

    #[tokio::test]
    async fn test_missing_database_file() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path());
        let missing = temp_dir.path().join("gitea.db");

        let result = SqliteAdapter.backup(&settings, &source(&missing.to_string_lossy())).await;
        assert!(matches!(result, Err(BackupError::SourceNotFound(_))));
    }

    #[tokio::test]
    async fn test_backup_then_restore_copies_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path());
        std::fs::create_dir_all(&settings.backup_staging).unwrap();
        std::fs::create_dir_all(&settings.restore_staging).unwrap();

        let live = temp_dir.path().join("data/gitea.db");
        std::fs::create_dir_all(live.parent().unwrap()).unwrap();
        std::fs::write(&live, b"SQLite format 3\0original").unwrap();
        let source = source(&live.to_string_lossy());

        SqliteAdapter.backup(&settings, &source).await.unwrap();
        let dump = settings.backup_staging.join("dump.sqlite3.db");
        assert_eq!(std::fs::read(&dump).unwrap(), b"SQLite format 3\0original");

        std::fs::copy(&dump, settings.restore_staging.join("dump.sqlite3.db")).unwrap();
        std::fs::write(&live, b"SQLite format 3\0modified").unwrap();

        SqliteAdapter.restore(&settings, &source).await.unwrap();
        assert_eq!(std::fs::read(&live).unwrap(), b"SQLite format 3\0original");
    }

    #[tokio::test]
    async fn test_restore_creates_missing_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(temp_dir.path());
        std::fs::create_dir_all(&settings.restore_staging).unwrap();
        std::fs::write(settings.restore_staging.join("dump.sqlite3.db"), b"db").unwrap();

        let live = temp_dir.path().join("fresh/data/gitea.db");
        SqliteAdapter.restore(&settings, &source(&live.to_string_lossy())).await.unwrap();
        assert_eq!(std::fs::read(&live).unwrap(), b"db");
    }
}
