//! CLI command implementations.

pub mod dump_log;
pub mod inspect;
pub mod verify;

use std::path::{Path, PathBuf};
use stitchdb_core::dir::DatabaseDir;

/// Finds the bucket logs of the database at `path`.
pub(crate) fn bucket_logs(path: &Path) -> Result<Vec<(String, PathBuf)>, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No database found at {}", path.display()).into());
    }
    Ok(DatabaseDir::bucket_logs(path)?)
}
