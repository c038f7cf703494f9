//! Staging tree to archive.

use super::ArchiveSummary;
use crate::utils::errors::{BackupError, Result};
use std::fs::File;
use std::io;
use std::path::{Component, Path};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Pack every directory and file below `staging_root` into `archive_path`.
///
/// The root itself is not recorded. Directory entries carry a trailing `/`.
/// A failure leaves whatever was written so far in place.
pub fn create_archive(staging_root: &Path, archive_path: &Path) -> Result<ArchiveSummary> {
    info!("Creating archive {} from {}", archive_path.display(), staging_root.display());

    let file = File::create(archive_path).map_err(|e| write_failed(archive_path, e))?;
    let mut zip = ZipWriter::new(file);

    let dir_options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    let mut summary = ArchiveSummary::default();

    let walker = WalkDir::new(staging_root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| BackupError::ArchiveWriteFailed(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(staging_root)
            .map_err(|e| BackupError::ArchiveWriteFailed(e.to_string()))?;
        let name = entry_name(relative);

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), dir_options.clone())
                .map_err(|e| BackupError::ArchiveWriteFailed(format!("{}: {}", name, e)))?;
            summary.directories += 1;
            continue;
        }

        let mut source = File::open(entry.path()).map_err(|e| write_failed(entry.path(), e))?;
        zip.start_file(name.as_str(), file_options.clone())
            .map_err(|e| BackupError::ArchiveWriteFailed(format!("{}: {}", name, e)))?;
        let bytes = io::copy(&mut source, &mut zip).map_err(|e| write_failed(entry.path(), e))?;

        debug!("Archived {} ({} bytes)", name, bytes);
        summary.files += 1;
        summary.bytes += bytes;
    }

    zip.finish()
        .map_err(|e| BackupError::ArchiveWriteFailed(format!("{}: {}", archive_path.display(), e)))?;

    info!(
        "Archive created: {} directories, {} files, {} bytes",
        summary.directories, summary.files, summary.bytes
    );
    Ok(summary)
}

/// Relative path joined with `/` regardless of the host separator.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn write_failed(path: &Path, e: io::Error) -> BackupError {
    BackupError::ArchiveWriteFailed(format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn entry_names(archive_path: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(File::open(archive_path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        assert_eq!(entry_name(Path::new("repo/org/project.git/HEAD")), "repo/org/project.git/HEAD");
        assert_eq!(entry_name(Path::new("dump.sqlite3.db")), "dump.sqlite3.db");
    }

    #[test]
    fn test_create_records_directories_and_files() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let staging = temp_dir.path().join("staging");
        fs::create_dir_all(staging.join("repo/org"))?;
        fs::create_dir_all(staging.join("avatars"))?;
        fs::write(staging.join("dump.mysql.sql"), b"CREATE TABLE t;")?;
        fs::write(staging.join("repo/org/HEAD"), b"ref: refs/heads/main")?;

        let archive_path = temp_dir.path().join("backup.zip");
        let summary = create_archive(&staging, &archive_path).unwrap();

        assert_eq!(summary.directories, 3);
        assert_eq!(summary.files, 2);
        assert_eq!(summary.bytes, 15 + 20);

        let names = entry_names(&archive_path);
        assert_eq!(names, vec!["avatars/", "dump.mysql.sql", "repo/", "repo/org/", "repo/org/HEAD"]);
        Ok(())
    }

    #[test]
    fn test_create_empty_staging_produces_empty_archive() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let staging = temp_dir.path().join("staging");
        fs::create_dir_all(&staging)?;

        let archive_path = temp_dir.path().join("backup.zip");
        let summary = create_archive(&staging, &archive_path).unwrap();

        assert_eq!(summary, ArchiveSummary::default());
        assert!(entry_names(&archive_path).is_empty());
        Ok(())
    }

    #[test]
    fn test_create_missing_staging_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = create_archive(&temp_dir.path().join("missing"), &temp_dir.path().join("backup.zip"));
        assert!(matches!(result, Err(BackupError::ArchiveWriteFailed(_))));
    }
}
