//! The transaction handle.

use crate::bucket::{Bucket, BucketState};
use crate::entry::Entry;
use crate::error::{CoreError, CoreResult};
use crate::index::{Index, IndexRule};
use crate::log::{LogRecord, LogWriter};
use crate::transaction::context::{ChangeSet, TxState};
use crate::types::{TransactionId, TxMode};
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock};
use std::ops::Bound;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// The bucket lock held by a transaction.
enum Guard {
    Shared(ArcRwLockReadGuard<RawRwLock, BucketState>),
    Exclusive(ArcRwLockWriteGuard<RawRwLock, BucketState>),
}

impl Guard {
    fn state(&self) -> &BucketState {
        match self {
            Self::Shared(guard) => &**guard,
            Self::Exclusive(guard) => &**guard,
        }
    }

    fn state_mut(&mut self) -> Option<&mut BucketState> {
        match self {
            Self::Shared(_) => None,
            Self::Exclusive(guard) => Some(&mut **guard),
        }
    }
}

/// A unit of work against one bucket.
///
/// Beginning a transaction acquires the bucket lock: shared for
/// [`TxMode::ReadOnly`], exclusive for [`TxMode::ReadWrite`]. The lock is
/// held until [`Tx::commit`] or [`Tx::rollback`], each of which releases it
/// exactly once, success or failure. A transaction dropped while still
/// active is rolled back.
///
/// Writes are applied in place, so the transaction sees its own changes.
/// Other transactions cannot observe them because they cannot acquire the
/// lock until this one ends.
///
/// Visitors passed to the walk methods return `true` to continue and
/// `false` to stop. Expired and invalidated entries are skipped.
pub struct Tx {
    id: TransactionId,
    mode: TxMode,
    bucket: Arc<Bucket>,
    guard: Option<Guard>,
    changes: ChangeSet,
    state: TxState,
}

impl Tx {
    pub(crate) fn begin(bucket: Arc<Bucket>, mode: TxMode) -> CoreResult<Self> {
        let guard = match mode {
            TxMode::ReadOnly => Guard::Shared(bucket.state().read_arc()),
            TxMode::ReadWrite => Guard::Exclusive(bucket.state().write_arc()),
        };
        // The bucket may have closed while we waited for the lock.
        bucket.ensure_open()?;

        let id = bucket.allocate_txid();
        debug!(txid = %id, bucket = bucket.name(), %mode, "transaction started");
        Ok(Self {
            id,
            mode,
            bucket,
            guard: Some(guard),
            changes: ChangeSet::default(),
            state: TxState::Active,
        })
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the transaction mode.
    #[must_use]
    pub fn mode(&self) -> TxMode {
        self.mode
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Returns true until the transaction commits or rolls back.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Returns the name of the bucket this transaction runs against.
    #[must_use]
    pub fn bucket_name(&self) -> &str {
        self.bucket.name()
    }

    /// Number of distinct keys written so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.changes.len()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Looks up a live entry by key.
    ///
    /// Expired and invalidated entries read as absent.
    pub fn get(&self, key: &str) -> CoreResult<Option<Arc<Entry>>> {
        let state = self.readable()?;
        Ok(state.primary.get(key).filter(|e| e.is_live()).cloned())
    }

    /// Returns true if `key` holds a live entry.
    pub fn has(&self, key: &str) -> CoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Returns the remaining time to live of a live entry.
    ///
    /// `None` means the entry never expires.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if `key` holds no live entry.
    pub fn expires_in(&self, key: &str) -> CoreResult<Option<Duration>> {
        let entry = self
            .get(key)?
            .ok_or_else(|| CoreError::not_found("key", key))?;
        Ok(entry.expires_in())
    }

    /// Number of entries physically present, expired ones included.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.readable()?.primary.len())
    }

    /// Returns true if the bucket holds no entries at all.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the live entry with the smallest key.
    pub fn min(&self) -> CoreResult<Option<Arc<Entry>>> {
        let state = self.readable()?;
        let now = SystemTime::now();
        Ok(state.primary.values().find(|e| live_at(e, now)).cloned())
    }

    /// Returns the live entry with the largest key.
    pub fn max(&self) -> CoreResult<Option<Arc<Entry>>> {
        let state = self.readable()?;
        let now = SystemTime::now();
        Ok(state.primary.values().rev().find(|e| live_at(e, now)).cloned())
    }

    /// Walks live entries in increasing key order.
    pub fn ascend<F>(&self, visitor: F) -> CoreResult<()>
    where
        F: FnMut(&Entry) -> bool,
    {
        let state = self.readable()?;
        walk(state.primary.values(), visitor);
        Ok(())
    }

    /// Walks live entries in decreasing key order.
    pub fn descend<F>(&self, visitor: F) -> CoreResult<()>
    where
        F: FnMut(&Entry) -> bool,
    {
        let state = self.readable()?;
        walk(state.primary.values().rev(), visitor);
        Ok(())
    }

    /// Walks live entries with `start <= key < end` in increasing order.
    pub fn ascend_range<F>(&self, start: &str, end: &str, visitor: F) -> CoreResult<()>
    where
        F: FnMut(&Entry) -> bool,
    {
        let state = self.readable()?;
        if start >= end {
            return Ok(());
        }
        let range = state
            .primary
            .range::<str, _>((Bound::Included(start), Bound::Excluded(end)));
        walk(range.map(|(_, entry)| entry), visitor);
        Ok(())
    }

    /// Walks live entries in the order of index `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no index has that name.
    pub fn ascend_index<F>(&self, name: &str, visitor: F) -> CoreResult<()>
    where
        F: FnMut(&Entry) -> bool,
    {
        let index = self.index(name)?;
        walk(index.entries(), visitor);
        Ok(())
    }

    /// Walks live entries in the reverse order of index `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no index has that name.
    pub fn descend_index<F>(&self, name: &str, visitor: F) -> CoreResult<()>
    where
        F: FnMut(&Entry) -> bool,
    {
        let index = self.index(name)?;
        walk(index.entries().rev(), visitor);
        Ok(())
    }

    /// Returns the names of all registered indexes, sorted.
    pub fn indexes(&self) -> CoreResult<Vec<String>> {
        let state = self.readable()?;
        let mut names: Vec<String> = state.indexes.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }

    /// Checks that every secondary index agrees with the primary index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexMismatch`] naming the first disagreement.
    pub fn verify_indexes(&self) -> CoreResult<()> {
        self.readable()?.verify()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Inserts or replaces an entry, returning the one it replaced.
    ///
    /// The previous value is returned even if it had expired.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalOperation`] on a read-only transaction and
    /// [`CoreError::InvalidState`] once the transaction ended or the bucket
    /// closed.
    pub fn set(&mut self, entry: Entry) -> CoreResult<Option<Arc<Entry>>> {
        let (state, changes) = self.writable("set")?;
        let key = entry.key().to_owned();
        let entry = Arc::new(entry);
        let previous = state.put(Arc::clone(&entry));
        changes.record(&key, previous.clone(), Some(entry));
        Ok(previous)
    }

    /// Removes an entry, returning it if it existed.
    ///
    /// Deleting a missing key changes nothing and records nothing.
    pub fn delete(&mut self, key: &str) -> CoreResult<Option<Arc<Entry>>> {
        let (state, changes) = self.writable("delete")?;
        let removed = state.remove(key);
        if let Some(previous) = &removed {
            changes.record(key, Some(Arc::clone(previous)), None);
        }
        Ok(removed)
    }

    /// Creates index `name` over the current entries.
    ///
    /// Entries whose value lacks the indexed field are left out.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyExists`] if the name is taken.
    pub fn create_index(&mut self, name: &str, rule: IndexRule) -> CoreResult<()> {
        let (state, changes) = self.writable("create_index")?;
        if state.indexes.contains_key(name) {
            return Err(CoreError::already_exists("index", name));
        }

        let mut index = Index::new(name, rule);
        index.build(state.primary.values());
        debug!(index = name, entries = index.len(), "index built");

        changes.record_index(name, None);
        state.indexes.insert(name.to_owned(), index);
        Ok(())
    }

    /// Removes index `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no index has that name.
    pub fn drop_index(&mut self, name: &str) -> CoreResult<()> {
        let (state, changes) = self.writable("drop_index")?;
        let index = state
            .indexes
            .remove(name)
            .ok_or_else(|| CoreError::not_found("index", name))?;
        changes.record_index(name, Some(index));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ending
    // ------------------------------------------------------------------

    /// Makes the transaction's net effect durable and releases the lock.
    ///
    /// The log receives a `Begin` record, one record per changed key in key
    /// order, and a `Commit` record, and is then flushed under the bucket's
    /// sync policy. A transaction that changed nothing writes nothing.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IllegalOperation`] on a read-only transaction, which
    ///   is ended anyway
    /// - [`CoreError::InvalidState`] if the transaction already ended, or if
    ///   the bucket closed, in which case the changes are reverted
    /// - [`CoreError::DurabilityFailure`] if the log rejected the commit; the
    ///   changes are reverted and the log cut back to its previous size. If
    ///   the cut fails too, the log may still hold the whole commit, so the
    ///   bucket is closed and the error says so
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_active()?;

        if !self.mode.is_writable() {
            self.finish(TxState::RolledBack);
            return Err(CoreError::illegal_operation(
                "commit requires a read-write transaction",
            ));
        }

        if let Err(err) = self.bucket.ensure_open() {
            self.revert();
            self.finish(TxState::RolledBack);
            return Err(err);
        }

        match self.persist() {
            Ok(()) => {
                debug!(txid = %self.id, writes = self.changes.len(), "transaction committed");
                self.finish(TxState::Committed);
                Ok(())
            }
            Err(err) => {
                warn!(txid = %self.id, error = %err, "commit failed, reverting in-memory changes");
                self.revert();
                self.finish(TxState::RolledBack);
                Err(err)
            }
        }
    }

    /// Undoes every change and releases the lock.
    ///
    /// On a read-only transaction this only releases the lock. Rollback is
    /// allowed after the bucket closed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] if the transaction already ended.
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.revert();
        self.finish(TxState::RolledBack);
        debug!(txid = %self.id, "transaction rolled back");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TxState::Active => Ok(()),
            TxState::Committed => Err(CoreError::invalid_state(format!(
                "transaction {} already committed",
                self.id
            ))),
            TxState::RolledBack => Err(CoreError::invalid_state(format!(
                "transaction {} already rolled back",
                self.id
            ))),
        }
    }

    fn readable(&self) -> CoreResult<&BucketState> {
        self.ensure_active()?;
        self.bucket.ensure_open()?;
        self.guard
            .as_ref()
            .map(Guard::state)
            .ok_or_else(|| CoreError::invalid_state("transaction holds no lock"))
    }

    fn writable(&mut self, operation: &str) -> CoreResult<(&mut BucketState, &mut ChangeSet)> {
        self.ensure_active()?;
        self.bucket.ensure_open()?;
        if !self.mode.is_writable() {
            return Err(CoreError::illegal_operation(format!(
                "{operation} requires a read-write transaction"
            )));
        }
        let state = self
            .guard
            .as_mut()
            .and_then(Guard::state_mut)
            .ok_or_else(|| CoreError::invalid_state("transaction holds no write lock"))?;
        Ok((state, &mut self.changes))
    }

    fn index(&self, name: &str) -> CoreResult<&Index> {
        self.readable()?
            .indexes
            .get(name)
            .ok_or_else(|| CoreError::not_found("index", name))
    }

    /// Writes the net effect to the log, cutting it back on failure.
    ///
    /// Every error is a [`CoreError::DurabilityFailure`]. When the cut fails
    /// the bucket is closed, since its log no longer matches memory.
    fn persist(&self) -> CoreResult<()> {
        if self.changes.net_effect().next().is_none() {
            return Ok(());
        }

        let mut log = self.bucket.log().lock();
        let mark = log.size().map_err(|e| CoreError::durability_failure(e.to_string()))?;
        let err = match write_commit(&mut log, self.id, &self.changes) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        match log.truncate(mark) {
            Ok(()) => Err(CoreError::durability_failure(err.to_string())),
            Err(cut) => {
                warn!(txid = %self.id, error = %cut, "could not cut back partial commit, closing bucket");
                self.bucket.mark_closed();
                Err(CoreError::durability_failure(format!(
                    "{err}; log could not be cut back ({cut}) and may hold the commit, bucket closed"
                )))
            }
        }
    }

    /// Restores the bucket from the change set. Read-only transactions have
    /// nothing to restore.
    fn revert(&mut self) {
        let changes = std::mem::take(&mut self.changes);
        if let Some(state) = self.guard.as_mut().and_then(Guard::state_mut) {
            changes.undo(state);
        }
    }

    fn finish(&mut self, state: TxState) {
        self.state = state;
        self.changes = ChangeSet::default();
        self.guard = None;
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if self.is_active() {
            if self.mode.is_writable() {
                warn!(txid = %self.id, bucket = self.bucket.name(), "active transaction dropped, rolling back");
            }
            self.revert();
            self.finish(TxState::RolledBack);
        }
    }
}

impl std::fmt::Debug for Tx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("bucket", &self.bucket.name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn write_commit(log: &mut LogWriter, txid: TransactionId, changes: &ChangeSet) -> CoreResult<()> {
    log.append(&LogRecord::Begin { txid })?;
    for (key, after) in changes.net_effect() {
        let record = match after {
            Some(entry) => LogRecord::set(txid, entry),
            None => LogRecord::delete(txid, key),
        };
        log.append(&record)?;
    }
    log.append(&LogRecord::Commit { txid })?;
    log.flush()
}

fn live_at(entry: &Entry, now: SystemTime) -> bool {
    entry.is_valid() && !entry.is_expired_at(now)
}

fn walk<'a, I, F>(entries: I, mut visitor: F)
where
    I: Iterator<Item = &'a Arc<Entry>>,
    F: FnMut(&Entry) -> bool,
{
    let now = SystemTime::now();
    for entry in entries {
        if live_at(entry, now) && !visitor(entry) {
            break;
        }
    }
}
