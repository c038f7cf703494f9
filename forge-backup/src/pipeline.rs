//! Backup and restore sequencer.
//!
//! Runs the phases of one invocation in a fixed order and stops at the first
//! failure, tagging the error with the phase that produced it. Completed
//! phases are never undone.

use crate::archive::{create_archive, extract_archive};
use crate::config::Settings;
use crate::database::DatabaseAdapter;
use crate::fs;
use crate::history;
use crate::source::SourceDescriptor;
use crate::storage::{self, StorageBackend};
use crate::utils::errors::{BackupError, Result};
use std::fmt;
use thiserror::Error;
use tracing::info;

/// Step of a backup or restore run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CleanStaging,
    DatabaseBackup,
    FileCopy,
    ArchiveCreate,
    Upload,
    Retention,
    LedgerCheck,
    Download,
    ArchiveExtract,
    DatabaseRestore,
    LedgerAppend,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::CleanStaging => "clean staging",
            Phase::DatabaseBackup => "database backup",
            Phase::FileCopy => "file copy",
            Phase::ArchiveCreate => "archive create",
            Phase::Upload => "upload",
            Phase::Retention => "retention",
            Phase::LedgerCheck => "ledger check",
            Phase::Download => "download",
            Phase::ArchiveExtract => "archive extract",
            Phase::DatabaseRestore => "database restore",
            Phase::LedgerAppend => "ledger append",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
#[error("{phase} phase failed")]
pub struct PipelineError {
    pub phase: Phase,
    #[source]
    pub source: BackupError,
}

trait InPhase<T> {
    fn in_phase(self, phase: Phase) -> std::result::Result<T, PipelineError>;
}

impl<T> InPhase<T> for Result<T> {
    fn in_phase(self, phase: Phase) -> std::result::Result<T, PipelineError> {
        self.map_err(|source| PipelineError { phase, source })
    }
}

/// Result of a successful backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub archive_identifier: String,
    pub archive_bytes: u64,
}

/// Result of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored(String),

    /// The ledger already listed the archive; nothing was touched
    AlreadyApplied(String),
}

pub struct Pipeline<'a> {
    settings: &'a Settings,
    source: &'a SourceDescriptor,
    database: &'a dyn DatabaseAdapter,
    storage: &'a dyn StorageBackend,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        source: &'a SourceDescriptor,
        database: &'a dyn DatabaseAdapter,
        storage: &'a dyn StorageBackend,
    ) -> Self {
        Self {
            settings,
            source,
            database,
            storage,
        }
    }

    pub async fn backup(&self) -> std::result::Result<BackupReport, PipelineError> {
        let settings = self.settings;
        info!(
            archive = %settings.archive_identifier,
            database = %self.database.kind(),
            storage = %self.storage.method(),
            "Starting backup"
        );

        fs::clean_staging(settings).await.in_phase(Phase::CleanStaging)?;

        self.database
            .backup(settings, self.source)
            .await
            .in_phase(Phase::DatabaseBackup)?;

        fs::backup_file_trees(settings, self.source)
            .await
            .in_phase(Phase::FileCopy)?;

        let archive_bytes = self.create_archive().await.in_phase(Phase::ArchiveCreate)?;

        self.storage.validate_config().in_phase(Phase::Upload)?;
        self.storage.upload(settings).await.in_phase(Phase::Upload)?;

        let retention = self
            .storage
            .ensure_max_retention(settings)
            .await
            .in_phase(Phase::Retention)?;
        info!(
            deleted = retention.deleted.len(),
            failed = retention.failed.len(),
            "Retention pass finished"
        );

        history::append(settings, &settings.archive_identifier)
            .await
            .in_phase(Phase::LedgerAppend)?;

        info!(archive = %settings.archive_identifier, bytes = archive_bytes, "Backup completed");
        Ok(BackupReport {
            archive_identifier: settings.archive_identifier.clone(),
            archive_bytes,
        })
    }

    pub async fn restore(&self) -> std::result::Result<RestoreOutcome, PipelineError> {
        let settings = self.settings;

        if history::check(settings).await.in_phase(Phase::LedgerCheck)? {
            let identifier = settings.restore_target.clone().unwrap_or_default();
            info!(archive = %identifier, "Archive already restored, nothing to do");
            return Ok(RestoreOutcome::AlreadyApplied(identifier));
        }

        fs::clean_staging(settings).await.in_phase(Phase::CleanStaging)?;

        self.storage.validate_config().in_phase(Phase::Download)?;
        let identifier = storage::require_restore_target(settings)
            .in_phase(Phase::Download)?
            .to_string();
        info!(
            archive = %identifier,
            database = %self.database.kind(),
            storage = %self.storage.method(),
            "Starting restore"
        );
        self.storage.download(settings).await.in_phase(Phase::Download)?;

        self.extract_archive().await.in_phase(Phase::ArchiveExtract)?;

        fs::restore_file_trees(settings, self.source)
            .await
            .in_phase(Phase::FileCopy)?;

        self.database
            .restore(settings, self.source)
            .await
            .in_phase(Phase::DatabaseRestore)?;

        history::append(settings, &identifier)
            .await
            .in_phase(Phase::LedgerAppend)?;

        info!(archive = %identifier, "Restore completed");
        Ok(RestoreOutcome::Restored(identifier))
    }

    /// Pack the backup staging tree on the blocking pool; returns the archive size.
    async fn create_archive(&self) -> Result<u64> {
        let staging = self.settings.backup_staging.clone();
        let archive = self.settings.backup_archive.clone();

        tokio::task::spawn_blocking(move || create_archive(&staging, &archive))
            .await
            .map_err(|e| BackupError::ArchiveWriteFailed(format!("archive task failed: {}", e)))??;

        Ok(tokio::fs::metadata(&self.settings.backup_archive).await?.len())
    }

    async fn extract_archive(&self) -> Result<()> {
        let archive = self.settings.restore_archive.clone();
        let staging = self.settings.restore_staging.clone();

        tokio::task::spawn_blocking(move || extract_archive(&archive, &staging))
            .await
            .map_err(|e| BackupError::ExtractFailed(format!("extract task failed: {}", e)))??;
        Ok(())
    }
}
