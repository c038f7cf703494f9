//! Remote storage backends.
//!
//! Every backend moves the local archive files named in [`Settings`] to and
//! from one remote location, lists what is stored under the archive prefix,
//! and deletes single archives. Retention is layered on top in
//! [`crate::retention`].

mod ftp;
mod s3;

pub use ftp::{FtpBackend, FtpConfig};
pub use s3::{S3Backend, S3Config};

use crate::config::Settings;
use crate::retention::{self, RemoteEntry, RetentionReport};
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Supported storage backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupMethod {
    ObjectStore,
    FileTransfer,
}

impl FromStr for BackupMethod {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "s3" | "object-store" => Ok(Self::ObjectStore),
            "ftp" | "file-transfer" => Ok(Self::FileTransfer),
            _ => Err(BackupError::UnsupportedBackend(s.to_string())),
        }
    }
}

impl fmt::Display for BackupMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectStore => write!(f, "s3"),
            Self::FileTransfer => write!(f, "ftp"),
        }
    }
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn method(&self) -> BackupMethod;

    /// Check that every required connection parameter is present.
    ///
    /// Called before each remote operation; performs no I/O.
    fn validate_config(&self) -> Result<()>;

    /// Upload `settings.backup_archive` as `settings.archive_identifier`.
    async fn upload(&self, settings: &Settings) -> Result<()>;

    /// Download `settings.restore_target` into `settings.restore_archive`.
    async fn download(&self, settings: &Settings) -> Result<()>;

    /// Archives stored remotely whose name starts with `prefix`.
    async fn list_archives(&self, prefix: &str) -> Result<Vec<RemoteEntry>>;

    async fn delete_archive(&self, name: &str) -> Result<()>;

    /// Delete everything past the newest `settings.max_retention` archives.
    async fn ensure_max_retention(&self, settings: &Settings) -> Result<RetentionReport> {
        self.validate_config()?;
        retention::enforce(self, settings).await
    }
}

/// Build the backend named by `method`, reading its connection parameters
/// from the process environment.
pub fn backend_for(method: &str) -> Result<Box<dyn StorageBackend>> {
    let backend: Box<dyn StorageBackend> = match method.parse::<BackupMethod>()? {
        BackupMethod::ObjectStore => Box::new(S3Backend::new(S3Config::from_env())),
        BackupMethod::FileTransfer => Box::new(FtpBackend::new(FtpConfig::from_env())),
    };
    Ok(backend)
}

/// The restore target, or a configuration error when none was supplied.
pub fn require_restore_target(settings: &Settings) -> Result<&str> {
    settings
        .restore_target
        .as_deref()
        .ok_or_else(|| BackupError::Configuration("BACKUP_FILENAME is required to download an archive".to_string()))
}

/// Reject a blank required parameter, naming the variable it comes from.
pub(crate) fn require(value: &str, var: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BackupError::Configuration(format!("{} is not set", var)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backup_method() {
        assert_eq!("s3".parse::<BackupMethod>().unwrap(), BackupMethod::ObjectStore);
        assert_eq!("S3".parse::<BackupMethod>().unwrap(), BackupMethod::ObjectStore);
        assert_eq!("object-store".parse::<BackupMethod>().unwrap(), BackupMethod::ObjectStore);
        assert_eq!("ftp".parse::<BackupMethod>().unwrap(), BackupMethod::FileTransfer);
        assert_eq!("file-transfer".parse::<BackupMethod>().unwrap(), BackupMethod::FileTransfer);
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        for method in ["", "sftp", "gcs"] {
            assert!(matches!(
                method.parse::<BackupMethod>(),
                Err(BackupError::UnsupportedBackend(_))
            ));
            assert!(matches!(backend_for(method), Err(BackupError::UnsupportedBackend(_))));
        }
    }

    #[test]
    fn test_require() {
        assert!(require("value", "HOST").is_ok());
        let err = require("  ", "HOST").unwrap_err();
        assert!(err.to_string().contains("HOST"));
    }
}
