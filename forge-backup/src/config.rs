//! Resolved run settings.
//!
//! Layers built-in defaults, an optional TOML file and the process
//! environment with the `config` crate, then resolves the archive naming
//! template exactly once. The resulting [`Settings`] is never mutated.

use crate::utils::errors::{BackupError, Result};
use chrono::{DateTime, Local};
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Placeholder replaced by the archive prefix in the naming template.
pub const PREFIX_PLACEHOLDER: &str = "@prefix";

/// Placeholder replaced by the capture time in the naming template.
pub const DATE_PLACEHOLDER: &str = "@date";

const DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Raw key/value view of the configuration before template resolution.
#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    #[serde(default)]
    backup_method: Option<String>,

    /// Legacy spelling kept for existing deployments
    #[serde(default)]
    backup_methode: Option<String>,

    #[serde(default)]
    backup_filename: Option<String>,

    #[serde(default = "default_backup_file_log")]
    backup_file_log: PathBuf,

    #[serde(default = "default_remote_filename")]
    backup_tmp_remote_filename: String,

    #[serde(default = "default_prefix")]
    backup_prefix: String,

    #[serde(default = "default_max_retention")]
    backup_max_retention: i64,

    #[serde(default = "default_backup_tmp_folder")]
    backup_tmp_folder: PathBuf,

    #[serde(default = "default_backup_tmp_filename")]
    backup_tmp_filename: PathBuf,

    #[serde(default = "default_restore_tmp_folder")]
    restore_tmp_folder: PathBuf,

    #[serde(default = "default_restore_tmp_filename")]
    restore_tmp_filename: PathBuf,

    #[serde(default = "default_app_ini_path")]
    app_ini_path: PathBuf,
}

// Default values
fn default_backup_file_log() -> PathBuf {
    PathBuf::from("/data/backupFileLog.txt")
}

fn default_remote_filename() -> String {
    format!("{}-{}.zip", PREFIX_PLACEHOLDER, DATE_PLACEHOLDER)
}

fn default_prefix() -> String {
    "gitea-backup".to_string()
}

fn default_max_retention() -> i64 {
    5
}

fn default_backup_tmp_folder() -> PathBuf {
    PathBuf::from("/tmp/backup")
}

fn default_backup_tmp_filename() -> PathBuf {
    PathBuf::from("/tmp/backup.zip")
}

fn default_restore_tmp_folder() -> PathBuf {
    PathBuf::from("/tmp/restore")
}

fn default_restore_tmp_filename() -> PathBuf {
    PathBuf::from("/tmp/restore.zip")
}

fn default_app_ini_path() -> PathBuf {
    PathBuf::from("/data/gitea/conf/app.ini")
}

/// Immutable settings for one backup or restore invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Storage backend selector (`s3`, `ftp`, ...), validated on selection
    pub backup_method: String,

    /// Archive identifier to fetch on restore, if one was supplied
    pub restore_target: Option<String>,

    /// Append-only ledger of applied archive identifiers
    pub history_file: PathBuf,

    /// Name of the archive produced by this run (template already resolved)
    pub archive_identifier: String,

    /// Prefix shared by every archive this installation uploads
    pub prefix: String,

    /// Number of remote archives to keep; zero or less disables trimming
    pub max_retention: i64,

    pub backup_staging: PathBuf,
    pub backup_archive: PathBuf,
    pub restore_staging: PathBuf,
    pub restore_archive: PathBuf,

    /// Location of the forge's own `app.ini`
    pub forge_config_path: PathBuf,
}

impl Settings {
    /// Load settings from the process environment, optionally layered over a TOML file.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        Self::load_from(config_file, None, Local::now())
    }

    /// Load settings from an explicit variable map instead of the process environment.
    pub fn from_vars(vars: HashMap<String, String>, now: DateTime<Local>) -> Result<Self> {
        Self::load_from(None, Some(vars), now)
    }

    fn load_from(
        config_file: Option<&Path>,
        vars: Option<HashMap<String, String>>,
        now: DateTime<Local>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(Environment::default().source(vars));

        let raw: RawSettings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| BackupError::Configuration(e.to_string()))?;

        Ok(Self::resolve(raw, now))
    }

    fn resolve(raw: RawSettings, now: DateTime<Local>) -> Self {
        let archive_identifier = resolve_template(&raw.backup_tmp_remote_filename, &raw.backup_prefix, now);

        let backup_method = raw
            .backup_method
            .filter(|m| !m.is_empty())
            .or(raw.backup_methode)
            .unwrap_or_default();

        Self {
            backup_method,
            restore_target: raw.backup_filename.filter(|f| !f.trim().is_empty()),
            history_file: raw.backup_file_log,
            archive_identifier,
            prefix: raw.backup_prefix,
            max_retention: raw.backup_max_retention,
            backup_staging: raw.backup_tmp_folder,
            backup_archive: raw.backup_tmp_filename,
            restore_staging: raw.restore_tmp_folder,
            restore_archive: raw.restore_tmp_filename,
            forge_config_path: raw.app_ini_path,
        }
    }

    /// Copy of these settings with a different restore target.
    pub fn with_restore_target(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.restore_target = if target.trim().is_empty() { None } else { Some(target) };
        self
    }

    /// Identifiers that retention trimming must never delete in this run.
    pub fn protected_identifiers(&self) -> Vec<&str> {
        let mut protected = vec![self.archive_identifier.as_str()];
        if let Some(target) = &self.restore_target {
            protected.push(target.as_str());
        }
        protected
    }
}

/// Substitute `@prefix` and `@date` in an archive naming template.
pub fn resolve_template(template: &str, prefix: &str, now: DateTime<Local>) -> String {
    template
        .replace(PREFIX_PLACEHOLDER, prefix)
        .replace(DATE_PLACEHOLDER, &now.format(DATE_FORMAT).to_string())
}
