//! Recursive tree copy between a forge directory and a staging tree.
//!
//! Symbolic links are not recreated: a link to a regular file is copied as
//! the file it points to, links to directories and broken links are skipped.

use crate::utils::errors::{BackupError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Counters reported after copying one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,

    /// Symlinks to directories and broken symlinks
    pub skipped_links: usize,
}

/// What to do with one walked entry.
enum EntryKind {
    Directory,
    File,
    Skip,
}

fn classify(entry: &DirEntry) -> EntryKind {
    let file_type = entry.file_type();

    if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_symlink() {
        // Resolve to decide; only links to regular files are copied
        match fs::metadata(entry.path()) {
            Ok(resolved) if resolved.is_file() => EntryKind::File,
            _ => EntryKind::Skip,
        }
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Skip
    }
}

/// Copy the contents of `src` into `dest`, creating `dest` and any missing
/// parents. Existing files under `dest` are overwritten.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<CopyStats> {
    let copy_failed = |path: &Path, source: io::Error| BackupError::FileCopyFailed {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(dest).map_err(|e| copy_failed(dest, e))?;

    let mut stats = CopyStats::default();

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
            copy_failed(&path, io::Error::from(e))
        })?;

        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target: PathBuf = dest.join(relative);

        match classify(&entry) {
            EntryKind::Directory => {
                fs::create_dir_all(&target).map_err(|e| copy_failed(&target, e))?;
                stats.directories += 1;
            }
            EntryKind::File => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| copy_failed(parent, e))?;
                }
                let bytes = fs::copy(entry.path(), &target).map_err(|e| copy_failed(entry.path(), e))?;
                stats.files += 1;
                stats.bytes += bytes;
            }
            EntryKind::Skip => {
                debug!("Skipping link {}", entry.path().display());
                stats.skipped_links += 1;
            }
        }
    }

    Ok(stats)
}
