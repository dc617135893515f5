//! Shared in-memory backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An in-memory log store.
///
/// Clones share the same buffer and fault switch. A test keeps one handle,
/// gives a boxed clone to a bucket, and can then inspect the written log or
/// make the next writes fail.
///
/// ```rust
/// use stitchdb_storage::{InMemoryBackend, StorageBackend};
///
/// let handle = InMemoryBackend::new();
/// let mut backend = handle.clone();
///
/// handle.fail_writes(true);
/// assert!(backend.append(b"x").is_err());
///
/// handle.fail_writes(false);
/// assert_eq!(backend.append(b"x").unwrap(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            failing: Arc::default(),
        }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Arms or disarms the write fault.
    ///
    /// While armed, `append`, `flush` and `sync` fail with
    /// [`StorageError::Injected`] and leave the buffer untouched.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_fault(&self, operation: &'static str) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Injected { operation });
        }
        Ok(())
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        self.check_fault("append")?;
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.check_fault("flush")
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.check_fault("sync")
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_previous_end() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.size().unwrap(), 11);
        assert_eq!(backend.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn clones_share_buffer() {
        let handle = InMemoryBackend::new();
        let mut boxed: Box<dyn StorageBackend> = Box::new(handle.clone());
        boxed.append(b"abc").unwrap();
        assert_eq!(handle.bytes(), b"abc");
    }

    #[test]
    fn read_past_end_fails() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());
        assert!(matches!(
            backend.read_at(3, 10),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(backend.read_at(5, 0).unwrap().is_empty());
    }

    #[test]
    fn armed_fault_rejects_writes() {
        let handle = InMemoryBackend::new();
        let mut backend = handle.clone();
        handle.fail_writes(true);

        assert!(matches!(
            backend.append(b"x"),
            Err(StorageError::Injected { operation: "append" })
        ));
        assert!(backend.flush().is_err());
        assert!(backend.sync().is_err());
        assert_eq!(backend.size().unwrap(), 0);

        handle.fail_writes(false);
        assert!(backend.flush().is_ok());
    }

    #[test]
    fn truncate_discards_tail() {
        let mut backend = InMemoryBackend::with_data(b"hello world".to_vec());
        backend.truncate(5).unwrap();
        assert_eq!(backend.bytes(), b"hello");
        assert!(matches!(
            backend.truncate(6),
            Err(StorageError::TruncateBeyondEnd { .. })
        ));
    }
}
