//! Filesystem side of a run: staging reset and forge file-tree copies.

pub mod staging;
pub mod walker;

pub use staging::clean_staging;
pub use walker::{copy_tree, CopyStats};

use crate::config::Settings;
use crate::source::{FileTree, SourceDescriptor};
use crate::utils::errors::{BackupError, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// Copy every configured forge tree into the backup staging tree.
///
/// A root that does not exist is logged and skipped.
pub async fn backup_file_trees(settings: &Settings, source: &SourceDescriptor) -> Result<CopyStats> {
    let mut total = CopyStats::default();

    for tree in source.file_trees() {
        let dest = settings.backup_staging.join(tree.staging_name);
        total = merge(total, copy_if_present(tree.root.clone(), dest, &tree).await?);
    }

    Ok(total)
}

/// Copy every staged tree from the restore staging tree back to its live root.
///
/// A tree missing from the archive is logged and skipped.
pub async fn restore_file_trees(settings: &Settings, source: &SourceDescriptor) -> Result<CopyStats> {
    let mut total = CopyStats::default();

    for tree in source.file_trees() {
        let src = settings.restore_staging.join(tree.staging_name);
        total = merge(total, copy_if_present(src, tree.root.clone(), &tree).await?);
    }

    Ok(total)
}

async fn copy_if_present(src: PathBuf, dest: PathBuf, tree: &FileTree) -> Result<CopyStats> {
    match tokio::fs::try_exists(&src).await {
        Ok(true) => {}
        Ok(false) => {
            warn!(tree = tree.staging_name, "Source {} does not exist, skipping", src.display());
            return Ok(CopyStats::default());
        }
        Err(source) => return Err(BackupError::FileCopyFailed { path: src, source }),
    }

    info!(tree = tree.staging_name, "Copying {} to {}", src.display(), dest.display());
    let stats = tokio::task::spawn_blocking(move || copy_tree(&src, &dest))
        .await
        .map_err(|e| BackupError::Io(std::io::Error::other(e)))??;

    info!(
        tree = tree.staging_name,
        "Copied {} files ({} bytes)", stats.files, stats.bytes
    );
    Ok(stats)
}

fn merge(a: CopyStats, b: CopyStats) -> CopyStats {
    CopyStats {
        directories: a.directories + b.directories,
        files: a.files + b.files,
        bytes: a.bytes + b.bytes,
        skipped_links: a.skipped_links + b.skipped_links,
    }
}
