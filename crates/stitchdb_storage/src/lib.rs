//! # StitchDB Storage
//!
//! Append-only byte stores backing the per-bucket durability logs.
//!
//! A backend never interprets what it holds. The log record envelope,
//! checksums and transaction framing all live in `stitchdb_core`; this crate
//! only promises that appended bytes can be read back, flushed and truncated.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - one OS file per log
//! - [`InMemoryBackend`] - shared in-memory buffer with fault injection, for
//!   ephemeral databases and tests
//!
//! ## Example
//!
//! ```rust
//! use stitchdb_storage::{InMemoryBackend, StorageBackend};
//!
//! let handle = InMemoryBackend::new();
//! let mut backend = handle.clone();
//! backend.append(b"record").unwrap();
//!
//! // The original handle observes the same bytes.
//! assert_eq!(handle.bytes(), b"record");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
