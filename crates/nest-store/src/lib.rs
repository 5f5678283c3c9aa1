//! Comment record storage for Nest.
//!
//! This crate owns the flat `comments` table: records keyed by id, plus a
//! secondary index from parent id to child ids. It knows nothing about reply
//! trees; cascading deletes are built by callers from [`Transaction`]
//! primitives.
//!
//! # Storage Backends
//!
//! All backends implement the [`RecordStore`] trait:
//!
//! - [`InMemoryRecordStore`]: table held in memory, for tests and embedding
//! - [`WalRecordStore`]: durable table replayed from a write-ahead log
//!
//! # Design Rules
//!
//! 1. Every mutation runs inside a [`Transaction`]; non-transactional `put`
//!    and `delete` are single-mutation transactions.
//! 2. A transaction either commits all of its mutations or none of them.
//!    Dropping an uncommitted transaction rolls it back.
//! 3. Writers are serialized: a transaction holds the table's write lock for
//!    its whole lifetime.
//! 4. The parent index is updated together with the table and is visible to
//!    reads as soon as the mutating call returns.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod durable;
pub mod error;
pub mod index;
pub mod memory;
pub mod table;
pub mod traits;
pub mod wal;

// Re-export primary types at crate root for ergonomic imports.
pub use durable::{WalRecordStore, WalStoreConfig};
pub use error::{StoreError, StoreResult};
pub use index::ParentIndex;
pub use memory::InMemoryRecordStore;
pub use table::Mutation;
pub use traits::{RecordStore, RecordStoreExt, Transaction};
pub use wal::{SyncMode, WalEntry, WriteAheadLog};
