//! Forge Backup Library
//!
//! Backup and restore engine for a self-hosted code forge: database dump,
//! repository and avatar trees, one zip archive per run, remote storage with
//! retention, and a ledger that keeps restores idempotent.

pub mod archive;
pub mod config;
pub mod database;
pub mod fs;
pub mod history;
pub mod pipeline;
pub mod retention;
pub mod source;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use pipeline::{BackupReport, Phase, Pipeline, PipelineError, RestoreOutcome};
pub use source::SourceDescriptor;
pub use utils::errors::{BackupError, Result};
