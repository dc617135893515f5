//! Per-bucket durability log.
//!
//! Every bucket appends its committed changes to its own log. A commit
//! writes a `Begin` record, one `Set` or `Delete` record per key in the
//! transaction's net effect, a `Commit` record, and then flushes.
//!
//! ## Record Format
//!
//! ```text
//! | magic "SLOG" (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! All integers are little endian. The CRC covers the header and payload.
//!
//! ## Reading
//!
//! [`LogRecordIterator`] walks a log from the start. A truncated final
//! record ends the walk cleanly; damaged records are reported as
//! [`crate::CoreError::LogCorruption`] or
//! [`crate::CoreError::ChecksumMismatch`]. Rebuilding buckets from a log is
//! left to the lifecycle layer; the engine itself never replays.
//!
//! ## Invariants
//!
//! - The log is **append-only**, except that a failed commit cuts its own
//!   partial records back off
//! - A commit's records are flushed before the commit returns `Ok`
//! - Index definitions are never logged

mod iterator;
mod record;
mod writer;

pub use iterator::LogRecordIterator;
pub use record::{LogRecord, LogRecordType, LOG_MAGIC, LOG_VERSION};
pub use writer::LogWriter;
