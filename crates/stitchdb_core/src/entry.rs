//! Bucket entries.

use bytes::Bytes;
use std::time::{Duration, SystemTime};

/// A key-value record stored in a bucket.
///
/// Entries are immutable once handed to [`crate::Tx::set`]. The bucket's
/// primary index owns them behind an `Arc`, and every secondary index points
/// at that same allocation. Replacing a key attaches a new entry; it never
/// edits the old one.
///
/// # Example
///
/// ```rust
/// use stitchdb_core::Entry;
/// use std::time::Duration;
///
/// let entry = Entry::new("session:42", r#"{"user":"ada"}"#)
///     .with_ttl(Duration::from_secs(30));
/// assert!(entry.is_live());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    key: String,
    value: Bytes,
    expires_at: Option<SystemTime>,
    valid: bool,
}

impl Entry {
    /// Creates a valid entry that never expires.
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expires_at: None,
            valid: true,
        }
    }

    /// Expires the entry `ttl` from now.
    #[must_use]
    pub fn with_ttl(self, ttl: Duration) -> Self {
        let at = SystemTime::now() + ttl;
        self.with_expiry(at)
    }

    /// Expires the entry at a fixed point in time.
    #[must_use]
    pub fn with_expiry(mut self, at: SystemTime) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Marks the entry invalid. Reads treat invalid entries as absent.
    #[must_use]
    pub fn invalidated(mut self) -> Self {
        self.valid = false;
        self
    }

    /// Rebuilds an entry from its stored parts.
    pub(crate) fn from_parts(
        key: String,
        value: Bytes,
        expires_at: Option<SystemTime>,
        valid: bool,
    ) -> Self {
        Self {
            key,
            value,
            expires_at,
            valid,
        }
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the opaque value.
    #[must_use]
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Returns the expiration time, if any.
    #[must_use]
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    /// Returns the validity flag.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns true when the expiration time has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    /// Returns true when the entry is expired as of `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Returns true when reads should observe this entry.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.valid && !self.is_expired()
    }

    /// Remaining time before expiration, or `None` when the entry never
    /// expires. An expired entry reports `Duration::ZERO`.
    #[must_use]
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_at.map(|at| {
            at.duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO)
        })
    }
}
