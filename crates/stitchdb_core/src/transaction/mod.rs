//! Transactions over a single bucket.
//!
//! StitchDB transactions work in place:
//! - **Isolation**: a read-write transaction holds its bucket's exclusive
//!   lock from begin to end; read-only transactions share the lock
//! - **Atomicity**: every mutation records the value it displaced, so a
//!   rollback restores the bucket exactly
//! - **Durability**: commit appends the net effect to the bucket's log and
//!   flushes before returning
//!
//! Index creation and removal are transactional but never logged.

mod context;
mod tx;

pub use context::TxState;
pub use tx::Tx;
