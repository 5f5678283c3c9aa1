use nest_types::CommentRecord;

use crate::error::StoreResult;

/// Storage backend for flat comment records.
///
/// All implementations must satisfy these invariants:
/// - Records are keyed by `id`; `put` is an upsert.
/// - The `parent_id -> id` index is maintained by every mutation and is never
///   exposed beyond [`child_ids_of`](RecordStore::child_ids_of).
/// - Mutations are only applied through a [`Transaction`]. Reads outside a
///   transaction see the last committed state.
/// - All I/O errors are propagated, never silently ignored.
pub trait RecordStore: Send + Sync {
    /// Every stored record. Callers must not rely on the order.
    fn get_all(&self) -> StoreResult<Vec<CommentRecord>>;

    /// Read one record by id.
    ///
    /// Returns `Ok(None)` if the record does not exist.
    fn get(&self, id: &str) -> StoreResult<Option<CommentRecord>>;

    /// Ids of all records whose `parent_id` equals `id`.
    fn child_ids_of(&self, id: &str) -> StoreResult<Vec<String>>;

    /// Number of stored records.
    fn count(&self) -> StoreResult<usize> {
        Ok(self.get_all()?.len())
    }

    /// Start a read-write transaction.
    ///
    /// Blocks until no other transaction is open on this store.
    fn begin(&self) -> StoreResult<Box<dyn Transaction + '_>>;

    /// Upsert a record in its own transaction.
    fn put(&self, record: &CommentRecord) -> StoreResult<()> {
        let mut tx = self.begin()?;
        tx.put(record)?;
        tx.commit()
    }

    /// Delete a record in its own transaction. Does not cascade.
    ///
    /// Returns `true` if the record existed.
    fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut tx = self.begin()?;
        let existed = tx.delete(id)?;
        tx.commit()?;
        Ok(existed)
    }
}

/// An open read-write transaction.
///
/// Mutations are visible to reads through the same transaction immediately.
/// [`commit`](Transaction::commit) makes them permanent; dropping the
/// transaction without committing undoes all of them.
pub trait Transaction {
    /// Read one record, including uncommitted changes of this transaction.
    fn get(&self, id: &str) -> StoreResult<Option<CommentRecord>>;

    /// Child ids, including uncommitted changes of this transaction.
    fn child_ids_of(&self, id: &str) -> StoreResult<Vec<String>>;

    /// Stage an upsert.
    fn put(&mut self, record: &CommentRecord) -> StoreResult<()>;

    /// Stage a delete. Returns `true` if the record existed.
    fn delete(&mut self, id: &str) -> StoreResult<bool>;

    /// Make all staged mutations permanent.
    ///
    /// On error nothing is applied: the transaction is rolled back.
    fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// Scoped transactions for any [`RecordStore`], including `dyn RecordStore`.
pub trait RecordStoreExt: RecordStore {
    /// Run `scope` inside one transaction.
    ///
    /// Commits if `scope` returns `Ok`; rolls back if it returns `Err` or
    /// panics. The transaction is released on every path.
    fn transaction<T, F>(&self, scope: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> StoreResult<T>,
    {
        let mut tx = self.begin()?;
        let value = scope(tx.as_mut())?;
        tx.commit()?;
        Ok(value)
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}
