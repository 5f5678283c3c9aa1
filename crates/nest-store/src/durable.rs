//! Durable record store replayed from a write-ahead log.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use nest_types::CommentRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreResult;
use crate::table::{CommitLog, Mutation, Table, TableTransaction};
use crate::traits::{RecordStore, Transaction};
use crate::wal::{SyncMode, WalEntry, WriteAheadLog};

/// Configuration for a [`WalRecordStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalStoreConfig {
    /// Sync/flush strategy for commits.
    pub sync_mode: SyncMode,
    /// Compact the log once it grows past this many bytes (and has at least
    /// doubled since the last compaction). `0` disables automatic compaction.
    pub compact_after_bytes: u64,
}

impl Default for WalStoreConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::default(),
            compact_after_bytes: 4 * 1024 * 1024, // 4 MiB
        }
    }
}

/// The log side of a [`WalRecordStore`].
struct WalCommitLog {
    wal: WriteAheadLog,
    compact_after_bytes: u64,
    /// Log size right after the last compaction (or open).
    baseline: AtomicU64,
}

impl WalCommitLog {
    fn compact(&self, table: &Table) -> StoreResult<()> {
        let records = table.all();
        let entries = if records.is_empty() {
            Vec::new()
        } else {
            vec![WalEntry {
                mutations: records.into_iter().map(Mutation::Put).collect(),
            }]
        };
        let before = self.wal.offset();
        self.wal.rewrite(&entries)?;
        let after = self.wal.offset();
        self.baseline.store(after, Ordering::Relaxed);
        info!(before, after, records = table.len(), "log compacted");
        Ok(())
    }

    fn should_compact(&self) -> bool {
        if self.compact_after_bytes == 0 {
            return false;
        }
        let size = self.wal.offset();
        size > self.compact_after_bytes && size > self.baseline.load(Ordering::Relaxed) * 2
    }
}

impl CommitLog for WalCommitLog {
    fn persist(&self, batch: &[Mutation], table: &Table) -> StoreResult<()> {
        self.wal.append(&WalEntry {
            mutations: batch.to_vec(),
        })?;

        // The batch is durable at this point; a failed compaction only
        // leaves a longer log behind.
        if self.should_compact() {
            if let Err(e) = self.compact(table) {
                warn!(error = %e, "automatic log compaction failed");
            }
        }
        Ok(())
    }
}

/// Durable `comments` table.
///
/// The table and its parent index live in memory and are rebuilt on open by
/// replaying the log in `<data_dir>/comments.wal`. Each committed transaction
/// is one log entry, appended before the commit returns.
pub struct WalRecordStore {
    data_dir: PathBuf,
    table: RwLock<Table>,
    log: WalCommitLog,
}

impl WalRecordStore {
    /// File name of the log inside the data directory.
    pub const LOG_FILE: &'static str = "comments.wal";

    /// Open (or create) the store in `data_dir`.
    ///
    /// Creates the directory and an empty log if absent, then replays every
    /// intact log entry. A torn tail left by a crash is cut off.
    pub fn open(data_dir: impl AsRef<Path>, config: WalStoreConfig) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let wal = WriteAheadLog::open(&data_dir.join(Self::LOG_FILE), config.sync_mode)?;

        let recovery = wal.recover()?;
        if recovery.valid_len < wal.offset() {
            warn!(
                valid_len = recovery.valid_len,
                file_len = wal.offset(),
                "discarding torn log tail"
            );
            wal.truncate_to(recovery.valid_len)?;
        }

        let mut table = Table::default();
        let frames = recovery.entries.len();
        for entry in recovery.entries {
            for mutation in entry.mutations {
                table.apply(mutation);
            }
        }

        info!(
            data_dir = %data_dir.display(),
            frames,
            records = table.len(),
            "comment store opened"
        );

        let baseline = wal.offset();
        Ok(Self {
            data_dir,
            table: RwLock::new(table),
            log: WalCommitLog {
                wal,
                compact_after_bytes: config.compact_after_bytes,
                baseline: AtomicU64::new(baseline),
            },
        })
    }

    /// Rewrite the log as a single entry holding the live records.
    pub fn compact(&self) -> StoreResult<()> {
        // Write lock: no commit may interleave with the rewrite.
        let table = self.table.write().expect("lock poisoned");
        self.log.compact(&table)
    }

    /// Current log size in bytes.
    pub fn log_size(&self) -> u64 {
        self.log.wal.offset()
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

impl RecordStore for WalRecordStore {
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
        debug!("transaction started");
        Ok(Box::new(TableTransaction::new(guard, Some(&self.log))))
    }
}

impl std::fmt::Debug for WalRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalRecordStore")
            .field("data_dir", &self.data_dir)
            .field("record_count", &self.len())
            .field("log_size", &self.log_size())
            .finish()
    }
}
