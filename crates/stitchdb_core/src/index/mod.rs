//! Secondary indexes.
//!
//! An index is a named ordering of a bucket's entries by one field of their
//! value. Indexes are:
//! - Declared inside a transaction with [`crate::Tx::create_index`]
//! - Built by a full pass over the primary index when declared
//! - Updated by every `set`/`delete` in the same transaction
//! - Undone together with the data on rollback
//!
//! Index definitions are not written to the durability log.

mod btree;
mod rule;

pub use btree::Index;
pub use rule::{FieldKey, IndexKind, IndexRule};
