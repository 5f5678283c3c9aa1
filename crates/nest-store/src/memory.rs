use std::sync::RwLock;

use nest_types::CommentRecord;

use crate::error::StoreResult;
use crate::table::{Table, TableTransaction};
use crate::traits::{RecordStore, Transaction};

/// In-memory record store.
///
/// Intended for tests and embedding. The table lives behind a `RwLock`;
/// transactions hold the write half, so readers wait while one is open.
pub struct InMemoryRecordStore {
    table: RwLock<Table>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table::default()),
        }
    }

    /// Create a store pre-loaded with `records`.
    pub fn with_records(records: impl IntoIterator<Item = CommentRecord>) -> Self {
        let mut table = Table::default();
        for record in records {
            table.insert(record);
        }
        Self {
            table: RwLock::new(table),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.table.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get_all(&self) -> StoreResult<Vec<CommentRecord>> {
        Ok(self.table.read().expect("lock poisoned").all())
    }

    fn get(&self, id: &str) -> StoreResult<Option<CommentRecord>> {
        Ok(self.table.read().expect("lock poisoned").get(id).cloned())
    }

    fn child_ids_of(&self, id: &str) -> StoreResult<Vec<String>> {
        Ok(self.table.read().expect("lock poisoned").child_ids_of(id))
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.len())
    }

    fn begin(&self) -> StoreResult<Box<dyn Transaction + '_>> {
        let guard = self.table.write().expect("lock poisoned");
        Ok(Box::new(TableTransaction::new(guard, None)))
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.len())
            .finish()
    }
}
