//! Database directory management.
//!
//! A directory-backed database lays its files out as:
//!
//! ```text
//! <db_path>/
//! ├─ LOCK              # Advisory lock for single-process access
//! ├─ users.log         # Durability log of bucket "users"
//! └─ orders.log        # Durability log of bucket "orders"
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_EXTENSION: &str = "log";

/// An open database directory.
///
/// Holds an exclusive advisory lock on `LOCK` for as long as it lives, so
/// only one process at a time can write the directory.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] if the directory is missing and
    ///   `create_if_missing` is false, or the path is not a directory
    /// - [`CoreError::DatabaseLocked`] if another process holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_argument(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_argument(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the log path of bucket `name`.
    #[must_use]
    pub fn bucket_log_path(&self, name: &str) -> PathBuf {
        log_path(&self.path, name)
    }

    /// Lists `(bucket, log path)` pairs found in `path`, sorted by bucket.
    ///
    /// Takes no lock, so inspection tools can read a directory another
    /// process has open.
    pub fn bucket_logs(path: &Path) -> CoreResult<Vec<(String, PathBuf)>> {
        let mut logs = Vec::new();
        for item in fs::read_dir(path)? {
            let file = item?.path();
            if !file.is_file() || file.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            if let Some(stem) = file.file_stem().and_then(|s| s.to_str()) {
                logs.push((stem.to_owned(), file.clone()));
            }
        }
        logs.sort();
        Ok(logs)
    }
}

/// Returns the log path of bucket `name` inside `dir`.
#[must_use]
pub fn log_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{LOG_EXTENSION}"))
}
