//! Buckets: independently locked namespaces.

use crate::config::SyncPolicy;
use crate::entry::Entry;
use crate::error::{CoreError, CoreResult};
use crate::index::Index;
use crate::log::{LogRecord, LogWriter};
use crate::transaction::Tx;
use crate::types::{TransactionId, TxMode};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use stitchdb_storage::StorageBackend;

/// The data a bucket lock protects.
///
/// Holds the primary index and the secondary index registry. It is only
/// reachable through a [`Tx`], which holds the bucket lock for as long as
/// it lives.
#[derive(Debug, Default)]
pub(crate) struct BucketState {
    pub(crate) primary: BTreeMap<String, Arc<Entry>>,
    pub(crate) indexes: HashMap<String, Index>,
}

impl BucketState {
    /// Stores `entry` in the primary index and every secondary index,
    /// returning the entry it replaced.
    pub(crate) fn put(&mut self, entry: Arc<Entry>) -> Option<Arc<Entry>> {
        for index in self.indexes.values_mut() {
            index.upsert(&entry);
        }
        self.primary.insert(entry.key().to_owned(), entry)
    }

    /// Removes `key` from the primary index and every secondary index.
    pub(crate) fn remove(&mut self, key: &str) -> Option<Arc<Entry>> {
        for index in self.indexes.values_mut() {
            index.remove(key);
        }
        self.primary.remove(key)
    }

    /// Makes `key` hold `value` again, or vanish when `value` is `None`.
    pub(crate) fn restore(&mut self, key: &str, value: Option<Arc<Entry>>) {
        match value {
            Some(entry) => {
                self.put(entry);
            }
            None => {
                self.remove(key);
            }
        }
    }

    /// Checks that every secondary index mirrors the primary index.
    ///
    /// An indexed entry must be the very allocation the primary index holds
    /// under its key, and every primary entry with a defined field must be
    /// indexed.
    pub(crate) fn verify(&self) -> CoreResult<()> {
        for (name, index) in &self.indexes {
            let mismatch = |key: &str| CoreError::IndexMismatch {
                index: name.clone(),
                key: key.to_owned(),
            };

            for entry in index.entries() {
                match self.primary.get(entry.key()) {
                    Some(primary) if Arc::ptr_eq(primary, entry) => {}
                    _ => return Err(mismatch(entry.key())),
                }
            }

            for (key, entry) in &self.primary {
                let expected = index.rule().extract(entry.value());
                if expected.as_ref() != index.field_of(key) {
                    return Err(mismatch(key));
                }
            }
        }
        Ok(())
    }
}

/// An independently locked namespace of entries.
///
/// A bucket owns one primary index ordered by key, any number of named
/// secondary indexes, a reader/writer lock over both, and an append-only
/// durability log. Buckets never share locks; transactions on different
/// buckets never contend.
///
/// ```rust
/// use stitchdb_core::{Database, Entry, TxMode};
///
/// let db = Database::open_in_memory().unwrap();
/// let bucket = db.create_bucket("users").unwrap();
///
/// let mut tx = bucket.begin(TxMode::ReadWrite).unwrap();
/// tx.set(Entry::new("ada", r#"{"age":36}"#)).unwrap();
/// tx.commit().unwrap();
/// ```
pub struct Bucket {
    name: String,
    state: Arc<RwLock<BucketState>>,
    log: Mutex<LogWriter>,
    next_txid: AtomicU64,
    closed: AtomicBool,
}

impl Bucket {
    /// Creates an empty bucket logging to `backend`.
    pub(crate) fn new(
        name: impl Into<String>,
        backend: Box<dyn StorageBackend>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(RwLock::new(BucketState::default())),
            log: Mutex::new(LogWriter::new(backend, policy)),
            next_txid: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Begins a transaction, blocking until the lock for `mode` is held.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] if the bucket is closed.
    pub fn begin(self: &Arc<Self>, mode: TxMode) -> CoreResult<Tx> {
        self.ensure_open()?;
        Tx::begin(Arc::clone(self), mode)
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the bucket has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Reads every record in the bucket's log.
    pub fn read_log(&self) -> CoreResult<Vec<LogRecord>> {
        let log = self.log.lock();
        log.iter()?.map(|item| item.map(|(_, record)| record)).collect()
    }

    /// Returns the log size in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.log.lock().size()
    }

    pub(crate) fn state(&self) -> &Arc<RwLock<BucketState>> {
        &self.state
    }

    pub(crate) fn log(&self) -> &Mutex<LogWriter> {
        &self.log
    }

    pub(crate) fn allocate_txid(&self) -> TransactionId {
        TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst))
    }

    pub(crate) fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            return Err(CoreError::invalid_state(format!(
                "bucket {} is closed",
                self.name
            )));
        }
        Ok(())
    }

    /// Marks the bucket closed and syncs its log.
    ///
    /// Transactions already running keep their lock but every further
    /// operation on them fails, except rollback.
    pub(crate) fn close(&self) -> CoreResult<()> {
        self.mark_closed();
        self.log.lock().sync()
    }

    /// Marks the bucket closed without touching its log.
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
