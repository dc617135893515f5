//! The append-only backend contract.

use crate::error::StorageResult;

/// An append-only byte store holding one bucket's durability log.
///
/// # Invariants
///
/// - `append` writes at the current end and returns that offset
/// - bytes are readable in the order they were appended
/// - after `flush` returns `Ok`, every earlier append has left the process
/// - after `sync` returns `Ok`, every earlier append is on stable storage
pub trait StorageBackend: Send + Sync {
    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] when the range is not
    /// fully inside the store.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Hands all appended bytes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces appended bytes and file metadata onto stable storage.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current length, which is where the next append lands.
    fn size(&self) -> StorageResult<u64>;

    /// Discards everything at and after `new_size`.
    ///
    /// # Errors
    ///
    /// Fails when `new_size` is larger than the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
