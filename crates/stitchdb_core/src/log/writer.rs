//! Log writer.

use crate::config::SyncPolicy;
use crate::error::CoreResult;
use crate::log::iterator::LogRecordIterator;
use crate::log::record::{encode_frame, LogRecord};
use std::time::Instant;
use stitchdb_storage::StorageBackend;

/// Appends records to one bucket's log and applies the sync policy.
///
/// The writer is owned by its bucket and only appended to by a transaction
/// holding the bucket's exclusive lock.
pub struct LogWriter {
    backend: Box<dyn StorageBackend>,
    policy: SyncPolicy,
    last_sync: Instant,
}

impl LogWriter {
    /// Wraps `backend` with the given sync policy.
    pub fn new(backend: Box<dyn StorageBackend>, policy: SyncPolicy) -> Self {
        Self {
            backend,
            policy,
            last_sync: Instant::now(),
        }
    }

    /// Appends one record and returns the offset it starts at.
    ///
    /// The record is not durable until [`LogWriter::flush`] returns.
    pub fn append(&mut self, record: &LogRecord) -> CoreResult<u64> {
        let frame = encode_frame(record)?;
        Ok(self.backend.append(&frame)?)
    }

    /// Pushes appended records out of the process, then syncs them when the
    /// policy asks for it.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        let due = match self.policy {
            SyncPolicy::Always => true,
            SyncPolicy::Interval(every) => self.last_sync.elapsed() >= every,
            SyncPolicy::Never => false,
        };
        if due {
            self.sync()?;
        }
        Ok(())
    }

    /// Forces appended records onto stable storage regardless of policy.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Returns the log size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Cuts the log back to `offset`.
    pub fn truncate(&mut self, offset: u64) -> CoreResult<()> {
        Ok(self.backend.truncate(offset)?)
    }

    /// Returns the configured sync policy.
    #[must_use]
    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Iterates every record currently in the log.
    pub fn iter(&self) -> CoreResult<LogRecordIterator<'_>> {
        LogRecordIterator::new(self.backend.as_ref())
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::types::TransactionId;
    use stitchdb_storage::InMemoryBackend;

    fn writer(policy: SyncPolicy) -> (InMemoryBackend, LogWriter) {
        let handle = InMemoryBackend::new();
        let writer = LogWriter::new(Box::new(handle.clone()), policy);
        (handle, writer)
    }

    #[test]
    fn append_then_iterate() {
        let (_, mut log) = writer(SyncPolicy::Always);
        let txid = TransactionId::new(1);
        log.append(&LogRecord::Begin { txid }).unwrap();
        log.append(&LogRecord::Commit { txid }).unwrap();
        log.flush().unwrap();

        let records: Vec<_> = log.iter().unwrap().map(|r| r.unwrap().1).collect();
        assert_eq!(
            records,
            vec![LogRecord::Begin { txid }, LogRecord::Commit { txid }]
        );
    }

    #[test]
    fn truncate_drops_later_records() {
        let (handle, mut log) = writer(SyncPolicy::Never);
        log.append(&LogRecord::Begin {
            txid: TransactionId::new(1),
        })
        .unwrap();
        let mark = log.size().unwrap();
        log.append(&LogRecord::Begin {
            txid: TransactionId::new(2),
        })
        .unwrap();

        log.truncate(mark).unwrap();
        assert_eq!(handle.bytes().len() as u64, mark);
        assert_eq!(log.iter().unwrap().count(), 1);
    }

    #[test]
    fn flush_surfaces_backend_failure() {
        let (handle, mut log) = writer(SyncPolicy::Always);
        handle.fail_writes(true);
        assert!(matches!(log.flush(), Err(CoreError::Storage(_))));
    }
}
