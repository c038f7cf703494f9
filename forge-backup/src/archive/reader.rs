//! Archive to staging tree.

use super::{ArchiveSummary, COPY_BUFFER_SIZE, EXTRACTED_MODE};
use crate::utils::errors::{BackupError, Result};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Unpack `archive_path` into `dest_root`, creating the root if needed.
///
/// Every entry must resolve strictly below `dest_root`; the first one that
/// does not aborts extraction with [`BackupError::PathTraversal`] before
/// anything is written for it. Symbolic links are skipped. A failure part
/// way through leaves the entries extracted so far in place.
pub fn extract_archive(archive_path: &Path, dest_root: &Path) -> Result<ArchiveSummary> {
    info!("Extracting archive {} into {}", archive_path.display(), dest_root.display());

    create_private_dir(dest_root).map_err(|e| extract_failed(dest_root, e))?;

    let file = File::open(archive_path).map_err(|e| extract_failed(archive_path, e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| BackupError::ExtractFailed(format!("{}: {}", archive_path.display(), e)))?;

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut summary = ArchiveSummary::default();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| BackupError::ExtractFailed(format!("entry #{}: {}", index, e)))?;
        let name = entry.name().to_string();
        let dest = resolve_entry_path(dest_root, &name)?;

        if entry.is_dir() {
            create_private_dir(&dest).map_err(|e| extract_failed(&dest, e))?;
            summary.directories += 1;
            continue;
        }

        if entry.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            warn!("Skipping symlink in archive: {}", name);
            summary.skipped_symlinks += 1;
            continue;
        }

        if let Some(parent) = dest.parent() {
            create_private_dir(parent).map_err(|e| extract_failed(parent, e))?;
        }

        let bytes = write_entry(&mut entry, &dest, &mut buffer).map_err(|e| extract_failed(&dest, e))?;
        debug!("Extracted {} ({} bytes)", name, bytes);
        summary.files += 1;
        summary.bytes += bytes;
    }

    info!(
        "Archive extracted: {} directories, {} files, {} bytes, {} symlinks skipped",
        summary.directories, summary.files, summary.bytes, summary.skipped_symlinks
    );
    Ok(summary)
}

/// Join an entry name onto `dest_root`, refusing anything that is not a strict descendant.
///
/// Both `/` and `\` are treated as separators so that names produced on
/// another platform cannot smuggle a `..` segment through.
pub fn resolve_entry_path(dest_root: &Path, name: &str) -> Result<PathBuf> {
    let traversal = || BackupError::PathTraversal(name.to_string());

    if name.starts_with('/') || name.starts_with('\\') || has_drive_prefix(name) {
        return Err(traversal());
    }

    let mut resolved = dest_root.to_path_buf();
    let mut depth = 0usize;

    for segment in name.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return Err(traversal()),
            part => {
                resolved.push(part);
                depth += 1;
            }
        }
    }

    if depth == 0 || !resolved.starts_with(dest_root) || resolved == dest_root {
        return Err(traversal());
    }

    Ok(resolved)
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Stream one entry to disk through the shared buffer, then force the mode.
fn write_entry(entry: &mut impl Read, dest: &Path, buffer: &mut [u8]) -> io::Result<u64> {
    let mut out = File::create(dest)?;
    let mut written = 0u64;

    loop {
        let read = entry.read(buffer)?;
        if read == 0 {
            break;
        }
        out.write_all(&buffer[..read])?;
        written += read as u64;
    }

    out.flush()?;
    drop(out);
    set_private_mode(dest)?;
    Ok(written)
}

fn create_private_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)?;
    set_private_mode(path)
}

#[cfg(unix)]
fn set_private_mode(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(EXTRACTED_MODE))
}

#[cfg(not(unix))]
fn set_private_mode(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn extract_failed(path: &Path, e: io::Error) -> BackupError {
    BackupError::ExtractFailed(format!("{}: {}", path.display(), e))
}
