//! Core type definitions for StitchDB.

use std::fmt;

/// Unique identifier for a transaction within a bucket.
///
/// Identifiers are monotonically increasing per bucket and only appear in
/// the durability log, where they frame one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Access mode of a transaction.
///
/// The mode decides which side of the bucket lock the transaction holds
/// for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxMode {
    /// Shared lock; reads only. Many may run at once.
    ReadOnly,
    /// Exclusive lock; reads and writes. Excludes every other transaction.
    ReadWrite,
}

impl TxMode {
    /// Returns true for [`TxMode::ReadWrite`].
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

impl fmt::Display for TxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => f.write_str("read-only"),
            Self::ReadWrite => f.write_str("read-write"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_ordering() {
        assert!(TransactionId::new(1) < TransactionId::new(2));
        assert_eq!(format!("{}", TransactionId::new(7)), "txn:7");
    }

    #[test]
    fn mode_writability() {
        assert!(TxMode::ReadWrite.is_writable());
        assert!(!TxMode::ReadOnly.is_writable());
    }
}
