//! Local staging area reset.

use crate::config::Settings;
use crate::utils::errors::Result;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Remove both staging trees and both local archive files, then recreate an
/// empty backup staging tree. Paths that are already absent are fine.
pub async fn clean_staging(settings: &Settings) -> Result<()> {
    remove_dir(&settings.backup_staging).await?;
    remove_dir(&settings.restore_staging).await?;
    remove_file(&settings.backup_archive).await?;
    remove_file(&settings.restore_archive).await?;

    fs::create_dir_all(&settings.backup_staging).await?;
    debug!("Staging area reset under {}", settings.backup_staging.display());
    Ok(())
}

async fn remove_dir(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_clean_staging_resets_everything() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        let vars: HashMap<String, String> = [
            ("BACKUP_TMP_FOLDER", root.join("backup")),
            ("BACKUP_TMP_FILENAME", root.join("backup.zip")),
            ("RESTORE_TMP_FOLDER", root.join("restore")),
            ("RESTORE_TMP_FILENAME", root.join("restore.zip")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string_lossy().to_string()))
        .collect();
        let settings = Settings::from_vars(vars, Local::now()).unwrap();

        // First run on a clean host: nothing exists yet.
        clean_staging(&settings).await.unwrap();
        assert!(settings.backup_staging.is_dir());

        std::fs::create_dir_all(settings.backup_staging.join("repo"))?;
        std::fs::create_dir_all(settings.restore_staging.join("avatars"))?;
        std::fs::write(&settings.backup_archive, b"old")?;
        std::fs::write(&settings.restore_archive, b"old")?;

        clean_staging(&settings).await.unwrap();

        assert!(settings.backup_staging.is_dir());
        assert_eq!(std::fs::read_dir(&settings.backup_staging)?.count(), 0);
        assert!(!settings.restore_staging.exists());
        assert!(!settings.backup_archive.exists());
        assert!(!settings.restore_archive.exists());
        Ok(())
    }
}
