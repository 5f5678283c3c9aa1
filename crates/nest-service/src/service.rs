use std::sync::Arc;

use nest_store::{
    InMemoryRecordStore, RecordStore, RecordStoreExt, StoreError, StoreResult, Transaction,
    WalRecordStore,
};
use nest_tree::{build_tree, CommentNode, Replies};
use nest_types::{validate_id, CommentRecord};
use tracing::{debug, info};

use crate::config::NestConfig;
use crate::error::{ServiceError, ServiceResult};

/// High-level comment API.
///
/// Owns id generation and timestamping. Store calls run on the blocking pool
/// so the service can be awaited from any tokio runtime.
#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn RecordStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Open the durable store under `config.data_dir`.
    pub fn open(config: &NestConfig) -> ServiceResult<Self> {
        let store = WalRecordStore::open(&config.data_dir, config.wal.clone())
            .map_err(ServiceError::StorageUnavailable)?;
        Ok(Self::new(Arc::new(store)))
    }

    /// A service backed by a fresh, empty in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRecordStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    // ---- Reads ----

    /// Load every comment and nest it into a tree.
    pub async fn get_comments(&self) -> ServiceResult<Replies> {
        let mut records = self
            .blocking(|store| store.get_all())
            .await
            .map_err(ServiceError::LoadFailed)?;
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        debug!(count = records.len(), "loaded comments");
        Ok(build_tree(records))
    }

    // ---- Writes ----

    /// Create a comment, top-level when `parent_id` is `None` or blank.
    ///
    /// The parent is not checked for existence; a reply to an unknown parent
    /// shows up as a root on the next load.
    pub async fn add_comment(
        &self,
        content: &str,
        parent_id: Option<&str>,
    ) -> ServiceResult<CommentNode> {
        // Content is the only input `create` can reject.
        let record =
            CommentRecord::create(content, parent_id).map_err(|_| ServiceError::EmptyContent)?;

        let stored = record.clone();
        self.blocking(move |store| store.put(&stored))
            .await
            .map_err(ServiceError::StorageUnavailable)?;

        info!(id = %record.id, parent = ?record.parent_id, "comment added");
        Ok(CommentNode::leaf(record))
    }

    /// Delete a comment and all of its descendants in one transaction.
    ///
    /// Returns the number of records removed. Deleting an unknown id removes
    /// nothing and succeeds.
    pub async fn delete_comment(&self, id: &str) -> ServiceResult<usize> {
        let id = validate_id(id).map_err(|_| ServiceError::MissingId)?.to_string();

        let seed = id.clone();
        let removed = self
            .blocking(move |store| store.transaction(|tx| delete_subtree(tx, &seed)))
            .await
            .map_err(ServiceError::StorageUnavailable)?;

        info!(%id, removed, "comment subtree deleted");
        Ok(removed)
    }

    async fn blocking<T, F>(&self, work: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RecordStore) -> StoreResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || work(store.as_ref()))
            .await
            .map_err(|e| StoreError::Unavailable(format!("storage task failed: {e}")))?
    }
}

impl std::fmt::Debug for CommentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentService").finish_non_exhaustive()
    }
}

/// Breadth-first removal of `seed` and everything below it.
///
/// Each visited id is deleted right after its children are queued, which also
/// drops its index entries, so an id is never queued twice even when the
/// stored parent links form a cycle.
fn delete_subtree(tx: &mut dyn Transaction, seed: &str) -> StoreResult<usize> {
    let mut queue = vec![seed.to_string()];
    let mut head = 0;
    let mut removed = 0;

    while head < queue.len() {
        let current = std::mem::take(&mut queue[head]);
        head += 1;

        queue.extend(tx.child_ids_of(&current)?);
        if tx.delete(&current)? {
            removed += 1;
        }
    }
    Ok(removed)
}
