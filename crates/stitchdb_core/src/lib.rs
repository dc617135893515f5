//! # StitchDB Core
//!
//! Embedded key-value engine for StitchDB.
//!
//! This crate provides:
//! - Buckets: independently locked namespaces of ordered entries
//! - Secondary indexes derived from JSON fields of entry values
//! - Transactions that hold their bucket's lock for their whole lifetime
//! - A per-bucket append-only durability log
//!
//! ```rust
//! use stitchdb_core::{Database, Entry, IndexRule, TxMode};
//!
//! let db = Database::open_in_memory().unwrap();
//! let bucket = db.create_bucket("scores").unwrap();
//!
//! let mut tx = bucket.begin(TxMode::ReadWrite).unwrap();
//! tx.create_index("by_points", IndexRule::int("points")).unwrap();
//! tx.set(Entry::new("bob", r#"{"points":7}"#)).unwrap();
//! tx.set(Entry::new("amy", r#"{"points":12}"#)).unwrap();
//! tx.commit().unwrap();
//!
//! let tx = bucket.begin(TxMode::ReadOnly).unwrap();
//! let mut ranked = Vec::new();
//! tx.descend_index("by_points", |e| {
//!     ranked.push(e.key().to_owned());
//!     true
//! })
//! .unwrap();
//! assert_eq!(ranked, ["amy", "bob"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bucket;
mod config;
mod database;
pub mod dir;
mod entry;
mod error;
pub mod index;
pub mod log;
mod transaction;
mod types;

pub use bucket::Bucket;
pub use config::{Config, SyncPolicy};
pub use database::Database;
pub use entry::Entry;
pub use error::{CoreError, CoreResult};
pub use index::{FieldKey, Index, IndexKind, IndexRule};
pub use log::{LogRecord, LogRecordIterator, LogRecordType};
pub use transaction::{Tx, TxState};
pub use types::{TransactionId, TxMode};

/// Crate version, as recorded by inspection tools.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
