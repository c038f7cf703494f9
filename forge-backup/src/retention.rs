//! Remote retention - keep the newest N archives under the prefix.
//!
//! The selection is a pure function over a listing so every backend shares
//! the same policy; only listing and deletion differ per backend.

use crate::config::Settings;
use crate::storage::StorageBackend;
use crate::utils::errors::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

/// One archive as reported by a remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub modified: DateTime<Utc>,
}

impl RemoteEntry {
    pub fn new(name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            modified,
        }
    }
}

/// Outcome of one retention pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Entries to delete: everything under `prefix` past the `keep` newest,
/// minus the protected names.
///
/// Entries with equal timestamps are ordered by name, highest first, so
/// date-stamped names still rank newest first when the listing only has
/// minute resolution.
pub fn select_expired(
    mut entries: Vec<RemoteEntry>,
    prefix: &str,
    keep: usize,
    protected: &[&str],
) -> Vec<RemoteEntry> {
    entries.retain(|e| e.name.starts_with(prefix));
    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));

    entries
        .into_iter()
        .skip(keep)
        .filter(|e| !protected.contains(&e.name.as_str()))
        .collect()
}

/// Trim `backend` down to the configured retention count.
///
/// Does nothing when the count is zero or negative. A failed listing is an
/// error; a failed deletion is logged and the loop moves on.
pub async fn enforce<B>(backend: &B, settings: &Settings) -> Result<RetentionReport>
where
    B: StorageBackend + ?Sized,
{
    if settings.max_retention <= 0 {
        debug!("Retention policy disabled, skipping cleanup");
        return Ok(RetentionReport::default());
    }

    let keep = settings.max_retention as usize;
    info!("Enforcing retention policy (max {} backups)", keep);

    let entries = backend.list_archives(&settings.prefix).await?;
    let listed = entries.len();
    let expired = select_expired(entries, &settings.prefix, keep, &settings.protected_identifiers());

    debug!(listed, expired = expired.len(), "Retention candidates selected");

    let mut report = RetentionReport::default();
    for entry in expired {
        match backend.delete_archive(&entry.name).await {
            Ok(()) => {
                info!(archive = %entry.name, "Deleted old backup");
                report.deleted.push(entry.name);
            }
            Err(e) => {
                error!(archive = %entry.name, "Failed to delete old backup: {}", e);
                report.failed.push(entry.name);
            }
        }
    }

    Ok(report)
}
