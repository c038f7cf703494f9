//! Archive codec - packs a staging tree into a single zip container and
//! unpacks one back into a staging tree.
//!
//! Entry names always use `/` as separator and are relative to the staging
//! root. Extraction rejects any entry that would land outside the
//! destination root, skips symbolic links and normalizes permissions to
//! owner-only.

mod reader;
mod writer;

pub use reader::extract_archive;
pub use writer::create_archive;

/// Mode applied to every extracted directory and file (rwx owner only).
pub const EXTRACTED_MODE: u32 = 0o700;

/// Size of the reusable copy buffer used while extracting (256 KiB).
pub const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Counters reported after packing or unpacking an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
    pub skipped_symlinks: usize,
}
