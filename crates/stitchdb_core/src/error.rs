//! Error types for StitchDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in StitchDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error outside of a commit.
    #[error("storage error: {0}")]
    Storage(#[from] stitchdb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The database or bucket is closed, or the transaction already ended.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Why the handle cannot be used.
        message: String,
    },

    /// The operation is not permitted for this transaction mode.
    #[error("illegal operation: {message}")]
    IllegalOperation {
        /// Description of the refused operation.
        message: String,
    },

    /// A named object already exists.
    #[error("{kind} already exists: {name}")]
    AlreadyExists {
        /// Kind of object (`"index"`, `"bucket"`).
        kind: &'static str,
        /// The duplicate name.
        name: String,
    },

    /// A named object does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Kind of object (`"index"`, `"bucket"`).
        kind: &'static str,
        /// The missing name.
        name: String,
    },

    /// The durability log rejected a commit.
    #[error("durability failure: {message}")]
    DurabilityFailure {
        /// Description of the underlying failure.
        message: String,
    },

    /// The durability log is corrupted.
    #[error("log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected in a log record.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// A secondary index disagrees with the primary index.
    #[error("index {index} out of sync for key {key}")]
    IndexMismatch {
        /// The inconsistent index.
        index: String,
        /// The key whose membership is wrong.
        key: String,
    },

    /// Another process holds the database directory.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// An argument was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an illegal operation error.
    pub fn illegal_operation(message: impl Into<String>) -> Self {
        Self::IllegalOperation {
            message: message.into(),
        }
    }

    /// Creates an already-exists error.
    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates a durability failure error.
    pub fn durability_failure(message: impl Into<String>) -> Self {
        Self::DurabilityFailure {
            message: message.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
