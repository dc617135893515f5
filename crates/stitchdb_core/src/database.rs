//! Database facade.

use crate::bucket::Bucket;
use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::transaction::Tx;
use crate::types::TxMode;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use stitchdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use tracing::{info, warn};

/// The main database handle.
///
/// A database is a registry of [`Bucket`]s. Each bucket is locked and
/// logged independently; the database only creates, finds and closes them.
///
/// # Example
///
/// ```rust
/// use stitchdb_core::{Database, Entry, IndexRule};
///
/// let db = Database::open_in_memory().unwrap();
/// db.create_bucket("people").unwrap();
///
/// db.update("people", |tx| {
///     tx.create_index("by_age", IndexRule::int("age"))?;
///     tx.set(Entry::new("ada", r#"{"age":36}"#))?;
///     tx.set(Entry::new("alan", r#"{"age":41}"#))?;
///     Ok(())
/// })
/// .unwrap();
///
/// let oldest = db
///     .view("people", |tx| tx.max())
///     .unwrap()
///     .unwrap();
/// assert_eq!(oldest.key(), "alan");
/// ```
pub struct Database {
    config: Config,
    /// Directory handle, `None` for in-memory databases.
    dir: Option<DatabaseDir>,
    buckets: RwLock<HashMap<String, Arc<Bucket>>>,
    is_open: RwLock<bool>,
}

impl Database {
    /// Opens a database directory with default configuration.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database directory.
    ///
    /// Each bucket created afterwards logs to `<path>/<bucket>.log`. Logs
    /// already in the directory are not loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseLocked`] if another process has the
    /// directory open.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing)?;
        info!(path = %path.display(), sync_policy = ?config.sync_policy, "database opened");
        Ok(Self {
            config,
            dir: Some(dir),
            buckets: RwLock::new(HashMap::new()),
            is_open: RwLock::new(true),
        })
    }

    /// Opens a database whose buckets log to memory.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_in_memory_with_config(Config::default())
    }

    /// Opens an in-memory database with the given configuration.
    pub fn open_in_memory_with_config(config: Config) -> CoreResult<Self> {
        info!("in-memory database opened");
        Ok(Self {
            config,
            dir: None,
            buckets: RwLock::new(HashMap::new()),
            is_open: RwLock::new(true),
        })
    }

    /// Creates a bucket.
    ///
    /// Directory-backed databases give the bucket a log file in the
    /// directory; in-memory databases give it an in-memory log.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] if the name is not made of ASCII
    ///   letters, digits, `_` and `-`
    /// - [`CoreError::AlreadyExists`] if the bucket exists, or its log file
    ///   is already in the directory
    pub fn create_bucket(&self, name: &str) -> CoreResult<Arc<Bucket>> {
        self.ensure_open()?;
        validate_bucket_name(name)?;

        let backend: Box<dyn StorageBackend> = match &self.dir {
            Some(dir) => {
                if self.buckets.read().contains_key(name) {
                    return Err(CoreError::already_exists("bucket", name));
                }
                let path = dir.bucket_log_path(name);
                if path.exists() {
                    return Err(CoreError::already_exists("bucket log", name));
                }
                Box::new(FileBackend::open(&path)?)
            }
            None => Box::new(InMemoryBackend::new()),
        };
        self.register(name, backend)
    }

    /// Creates a bucket logging to `backend`.
    pub fn create_bucket_with_backend(
        &self,
        name: &str,
        backend: Box<dyn StorageBackend>,
    ) -> CoreResult<Arc<Bucket>> {
        self.ensure_open()?;
        validate_bucket_name(name)?;
        self.register(name, backend)
    }

    /// Inserts a new bucket into the registry.
    ///
    /// Holds the `is_open` read lock across the insert, so `close` either
    /// runs first and the insert fails, or runs after and closes the bucket.
    pub(crate) fn register(
        &self,
        name: &str,
        backend: Box<dyn StorageBackend>,
    ) -> CoreResult<Arc<Bucket>> {
        let is_open = self.is_open.read();
        if !*is_open {
            return Err(CoreError::invalid_state("database is closed"));
        }
        let mut buckets = self.buckets.write();
        if buckets.contains_key(name) {
            return Err(CoreError::already_exists("bucket", name));
        }
        let bucket = Arc::new(Bucket::new(name, backend, self.config.sync_policy));
        buckets.insert(name.to_owned(), Arc::clone(&bucket));
        info!(bucket = name, "bucket created");
        Ok(bucket)
    }

    /// Returns bucket `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the bucket does not exist.
    pub fn bucket(&self, name: &str) -> CoreResult<Arc<Bucket>> {
        self.ensure_open()?;
        self.buckets
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::not_found("bucket", name))
    }

    /// Returns all bucket names, sorted.
    #[must_use]
    pub fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Removes bucket `name` and deletes its log file.
    ///
    /// Waits for transactions running on the bucket to end. Handles to the
    /// bucket held elsewhere see it as closed. The log file is deleted even
    /// when its final sync fails; that error is returned afterwards.
    pub fn drop_bucket(&self, name: &str) -> CoreResult<()> {
        self.ensure_open()?;
        let bucket = self
            .buckets
            .write()
            .remove(name)
            .ok_or_else(|| CoreError::not_found("bucket", name))?;

        let closed = {
            let _exclusive = bucket.state().write();
            bucket.close()
        };
        if let Err(err) = &closed {
            warn!(bucket = name, error = %err, "failed to sync dropped bucket log");
        }

        if let Some(dir) = &self.dir {
            let path = dir.bucket_log_path(name);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        info!(bucket = name, "bucket dropped");
        closed
    }

    /// Begins a transaction on bucket `name`.
    ///
    /// Blocks until the bucket lock for `mode` is available.
    pub fn begin(&self, bucket: &str, mode: TxMode) -> CoreResult<Tx> {
        self.bucket(bucket)?.begin(mode)
    }

    /// Runs `f` in a read-only transaction.
    pub fn view<F, T>(&self, bucket: &str, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Tx) -> CoreResult<T>,
    {
        let mut tx = self.begin(bucket, TxMode::ReadOnly)?;
        let result = f(&tx);
        tx.rollback()?;
        result
    }

    /// Runs `f` in a read-write transaction.
    ///
    /// If `f` returns `Ok` the transaction is committed, otherwise it is
    /// rolled back and the error returned. A transaction `f` already ended
    /// is left alone.
    pub fn update<F, T>(&self, bucket: &str, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Tx) -> CoreResult<T>,
    {
        let mut tx = self.begin(bucket, TxMode::ReadWrite)?;
        match f(&mut tx) {
            Ok(value) => {
                if tx.is_active() {
                    tx.commit()?;
                }
                Ok(value)
            }
            Err(err) => {
                if tx.is_active() {
                    tx.rollback()?;
                }
                Err(err)
            }
        }
    }

    /// Closes the database.
    ///
    /// Every bucket is marked closed and its log synced. Transactions still
    /// running fail on their next operation. Closing twice is a no-op.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        *is_open = false;

        let mut first_error = None;
        for bucket in self.buckets.write().values() {
            if let Err(err) = bucket.close() {
                warn!(bucket = bucket.name(), error = %err, "failed to sync bucket log on close");
                first_error.get_or_insert(err);
            }
        }
        info!("database closed");
        first_error.map_or(Ok(()), Err)
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    /// Returns the database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the directory path, `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(DatabaseDir::path)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::invalid_state("database is closed"))
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .field("buckets", &self.bucket_names())
            .field("is_open", &self.is_open())
            .finish()
    }
}

fn validate_bucket_name(name: &str) -> CoreResult<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(CoreError::invalid_argument(format!(
            "invalid bucket name {name:?}"
        )))
    }
}
