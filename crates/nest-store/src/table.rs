//! The `comments` table shared by every backend, and its transactions.

use std::collections::BTreeMap;
use std::sync::RwLockWriteGuard;

use nest_types::CommentRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::index::ParentIndex;
use crate::traits::Transaction;

/// One committed change to the table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Upsert a record.
    Put(CommentRecord),
    /// Remove the record with this id.
    Delete(String),
}

/// Records keyed by id plus the parent index.
#[derive(Debug, Default)]
pub(crate) struct Table {
    records: BTreeMap<String, CommentRecord>,
    by_parent: ParentIndex,
}

impl Table {
    pub(crate) fn get(&self, id: &str) -> Option<&CommentRecord> {
        self.records.get(id)
    }

    /// All records in ascending id order.
    pub(crate) fn all(&self) -> Vec<CommentRecord> {
        self.records.values().cloned().collect()
    }

    pub(crate) fn child_ids_of(&self, id: &str) -> Vec<String> {
        self.by_parent.children_of(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Upsert, returning the record it replaced.
    pub(crate) fn insert(&mut self, record: CommentRecord) -> Option<CommentRecord> {
        let previous = self.records.insert(record.id.clone(), record.clone());
        if let Some(old_parent) = previous.as_ref().and_then(|p| p.parent_id.as_deref()) {
            self.by_parent.remove(old_parent, &record.id);
        }
        if let Some(parent) = record.parent_id.as_deref() {
            self.by_parent.insert(parent, &record.id);
        }
        previous
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<CommentRecord> {
        let removed = self.records.remove(id)?;
        if let Some(parent) = removed.parent_id.as_deref() {
            self.by_parent.remove(parent, id);
        }
        Some(removed)
    }

    /// Apply a mutation read back from a log.
    pub(crate) fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Put(record) => {
                self.insert(record);
            }
            Mutation::Delete(id) => {
                self.remove(&id);
            }
        }
    }
}

/// Where committed batches go before they count as committed.
pub(crate) trait CommitLog: Send + Sync {
    /// Persist one transaction's mutations. `table` already holds them.
    fn persist(&self, batch: &[Mutation], table: &Table) -> StoreResult<()>;
}

/// How to reverse one staged mutation.
enum Undo {
    /// Put back a record that was overwritten or deleted.
    Restore(CommentRecord),
    /// Remove a record that did not exist before.
    Remove(String),
}

/// Transaction over a [`Table`] behind its write lock.
///
/// Mutations are applied to the table eagerly and recorded in an undo log;
/// rollback replays the undo log in reverse.
pub(crate) struct TableTransaction<'a> {
    table: RwLockWriteGuard<'a, Table>,
    log: Option<&'a dyn CommitLog>,
    undo: Vec<Undo>,
    journal: Vec<Mutation>,
    committed: bool,
}

impl<'a> TableTransaction<'a> {
    pub(crate) fn new(table: RwLockWriteGuard<'a, Table>, log: Option<&'a dyn CommitLog>) -> Self {
        Self {
            table,
            log,
            undo: Vec::new(),
            journal: Vec::new(),
            committed: false,
        }
    }

    fn rollback(&mut self) {
        let count = self.undo.len();
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::Restore(record) => {
                    self.table.insert(record);
                }
                Undo::Remove(id) => {
                    self.table.remove(&id);
                }
            }
        }
        self.journal.clear();
        if count > 0 {
            debug!(undone = count, "transaction rolled back");
        }
    }
}

impl Transaction for TableTransaction<'_> {
    fn get(&self, id: &str) -> StoreResult<Option<CommentRecord>> {
        Ok(self.table.get(id).cloned())
    }

    fn child_ids_of(&self, id: &str) -> StoreResult<Vec<String>> {
        Ok(self.table.child_ids_of(id))
    }

    fn put(&mut self, record: &CommentRecord) -> StoreResult<()> {
        if record.id.is_empty() {
            return Err(StoreError::EmptyId);
        }
        let undo = match self.table.insert(record.clone()) {
            Some(previous) => Undo::Restore(previous),
            None => Undo::Remove(record.id.clone()),
        };
        self.undo.push(undo);
        self.journal.push(Mutation::Put(record.clone()));
        Ok(())
    }

    fn delete(&mut self, id: &str) -> StoreResult<bool> {
        match self.table.remove(id) {
            Some(previous) => {
                self.undo.push(Undo::Restore(previous));
                self.journal.push(Mutation::Delete(id.to_string()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        if !self.journal.is_empty() {
            if let Some(log) = self.log {
                // On failure `self` drops uncommitted and rolls back.
                log.persist(&self.journal, &self.table)?;
            }
        }
        self.committed = true;
        debug!(mutations = self.journal.len(), "transaction committed");
        Ok(())
    }
}

impl Drop for TableTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nest_types::Timestamp;
    use std::sync::RwLock;

    fn record(id: &str, parent: Option<&str>) -> CommentRecord {
        CommentRecord {
            id: id.into(),
            content: format!("comment {id}"),
            created_at: Timestamp::from("2024-01-01T00:00:00.000Z"),
            parent_id: parent.map(str::to_string),
        }
    }

    struct FailingLog;

    impl CommitLog for FailingLog {
        fn persist(&self, _batch: &[Mutation], _table: &Table) -> StoreResult<()> {
            Err(StoreError::Unavailable("disk gone".into()))
        }
    }

    #[test]
    fn insert_maintains_index() {
        let mut table = Table::default();
        table.insert(record("1", None));
        table.insert(record("2", Some("1")));
        assert_eq!(table.child_ids_of("1"), vec!["2"]);
    }

    #[test]
    fn reparenting_moves_index_entry() {
        let mut table = Table::default();
        table.insert(record("2", Some("1")));
        table.insert(record("2", Some("9")));
        assert!(table.child_ids_of("1").is_empty());
        assert_eq!(table.child_ids_of("9"), vec!["2"]);
    }

    #[test]
    fn remove_clears_index() {
        let mut table = Table::default();
        table.insert(record("2", Some("1")));
        assert!(table.remove("2").is_some());
        assert!(table.child_ids_of("1").is_empty());
        assert!(table.remove("2").is_none());
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let lock = RwLock::new(Table::default());
        lock.write().unwrap().insert(record("1", None));
        {
            let mut tx = TableTransaction::new(lock.write().unwrap(), None);
            tx.put(&record("2", Some("1"))).unwrap();
            tx.put(&record("1", None)).unwrap();
            assert!(tx.delete("1").unwrap());
            assert!(tx.get("1").unwrap().is_none());
        }
        let table = lock.read().unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("1"), Some(&record("1", None)));
        assert!(table.child_ids_of("1").is_empty());
    }

    #[test]
    fn failed_persist_rolls_back() {
        let lock = RwLock::new(Table::default());
        let log = FailingLog;
        let mut tx = Box::new(TableTransaction::new(lock.write().unwrap(), Some(&log)));
        tx.put(&record("1", None)).unwrap();
        assert!(tx.commit().is_err());
        assert_eq!(lock.read().unwrap().len(), 0);
    }

    #[test]
    fn empty_transaction_skips_log() {
        let lock = RwLock::new(Table::default());
        let log = FailingLog;
        let mut tx = Box::new(TableTransaction::new(lock.write().unwrap(), Some(&log)));
        assert!(!tx.delete("missing").unwrap());
        assert!(tx.commit().is_ok());
    }

    #[test]
    fn put_rejects_empty_id() {
        let lock = RwLock::new(Table::default());
        let mut tx = TableTransaction::new(lock.write().unwrap(), None);
        assert!(matches!(tx.put(&record("", None)), Err(StoreError::EmptyId)));
    }
}
