//! Idempotency ledger - one applied archive identifier per line.

use crate::config::Settings;
use crate::utils::errors::Result;
use std::io::ErrorKind;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Was `settings.restore_target` already applied on this host?
///
/// False when no target is set or the ledger does not exist yet. Lines are
/// compared after trimming surrounding whitespace and must match exactly.
pub async fn check(settings: &Settings) -> Result<bool> {
    let Some(target) = settings.restore_target.as_deref() else {
        return Ok(false);
    };

    let content = match fs::read_to_string(&settings.history_file).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("History file {} does not exist yet", settings.history_file.display());
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    Ok(content.lines().any(|line| line.trim() == target))
}

/// Record `identifier` as applied, creating the ledger if needed.
pub async fn append(settings: &Settings, identifier: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.history_file)
        .await?;

    file.write_all(format!("{}\n", identifier).as_bytes()).await?;
    file.flush().await?;

    debug!("Recorded {} in {}", identifier, settings.history_file.display());
    Ok(())
}
