//! Utility modules for the backup engine.

pub mod errors;
pub mod logger;
pub mod secret;

pub use errors::{BackupError, Result};
pub use secret::Secret;
