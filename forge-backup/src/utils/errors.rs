//! Error taxonomy shared by every phase of a backup or restore run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported database kind: {0:?}")]
    UnsupportedDatabaseKind(String),

    #[error("Unsupported storage backend: {0:?}")]
    UnsupportedBackend(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Remote object not found: {0}")]
    ObjectNotFound(String),

    #[error("{tool} dump failed: {reason}")]
    DumpFailed { tool: &'static str, reason: String },

    #[error("{tool} restore failed: {reason}")]
    RestoreApplyFailed { tool: &'static str, reason: String },

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Archive write failed: {0}")]
    ArchiveWriteFailed(String),

    #[error("Archive extraction failed: {0}")]
    ExtractFailed(String),

    #[error("Archive entry escapes extraction root: {0:?}")]
    PathTraversal(String),

    #[error("Failed to copy {path}: {source}")]
    FileCopyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;
