use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::table::Mutation;

/// WAL entry: the mutations of one committed transaction.
///
/// On-disk format:
/// ```text
/// [4 bytes: entry length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized Vec<Mutation>)]
/// ```
///
/// A frame is all-or-nothing on recovery, so a transaction is never replayed
/// halfway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Mutations in the order they were applied.
    pub mutations: Vec<Mutation>,
}

/// Flush/sync strategy for the WAL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every commit (safest, highest latency).
    #[default]
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    OsDefault,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Internal mutable state for the WAL writer.
struct WalWriter {
    writer: BufWriter<File>,
    /// Current write offset in the log file. Always a frame boundary.
    offset: u64,
    /// Set when a failed append could not be cut back off the file. The tail
    /// is then unknown and every later append is refused.
    failed: Option<String>,
}

/// Result of reading a log front-to-back.
#[derive(Debug)]
pub struct Recovery {
    /// Every intact entry, in write order.
    pub entries: Vec<WalEntry>,
    /// Offset just past the last well-framed entry. Anything after it is a
    /// torn tail.
    pub valid_len: u64,
}

/// Crash-recoverable Write-Ahead Log holding the `comments` table.
///
/// Entries are serialized with bincode, framed with a length prefix and a
/// CRC32 checksum, and appended to a single file. On recovery the file is
/// read front-to-back; entries that fail the CRC check are skipped and a
/// torn tail ends recovery.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    sync_mode: SyncMode,
    #[cfg(test)]
    fail_next_append: AtomicBool,
}

impl WriteAheadLog {
    /// Open (or create) the log file at the given path.
    pub fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::DataDir {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let (writer, offset) = Self::open_writer(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter {
                writer,
                offset,
                failed: None,
            }),
            sync_mode,
            #[cfg(test)]
            fail_next_append: AtomicBool::new(false),
        })
    }

    fn open_writer(path: &Path) -> StoreResult<(BufWriter<File>, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let offset = file.metadata()?.len();
        Ok((BufWriter::new(file), offset))
    }

    /// Append a single entry to the WAL. Returns the byte offset of the entry.
    ///
    /// On failure nothing of the frame is left behind: buffered bytes are
    /// dropped and the file is cut back to the previous frame boundary. If
    /// that cleanup fails too, the log refuses all further appends.
    pub fn append(&self, entry: &WalEntry) -> StoreResult<u64> {
        let frame = encode_frame(entry)?;

        let mut w = self.writer.lock().expect("WAL mutex poisoned");
        if let Some(reason) = &w.failed {
            return Err(StoreError::Unavailable(format!(
                "log closed after unrecoverable write failure: {reason}"
            )));
        }
        let entry_offset = w.offset;

        if let Err(e) = self.write_frame(&mut w, &frame) {
            warn!(offset = entry_offset, error = %e, "WAL append failed; discarding partial frame");
            if let Err(repair) = self.discard_tail(&mut w) {
                warn!(error = %repair, "could not discard partial frame; closing log");
                w.failed = Some(repair.to_string());
            }
            return Err(e);
        }

        w.offset += frame.len() as u64;

        debug!(
            offset = entry_offset,
            len = frame.len() - HEADER_SIZE,
            mutations = entry.mutations.len(),
            "WAL append"
        );
        Ok(entry_offset)
    }

    fn write_frame(&self, w: &mut WalWriter, frame: &[u8]) -> StoreResult<()> {
        #[cfg(test)]
        if self.fail_next_append.swap(false, Ordering::SeqCst) {
            // Half the frame reaches the file, a quarter stays buffered.
            let half = frame.len() / 2;
            w.writer.write_all(&frame[..half])?;
            w.writer.flush()?;
            w.writer.write_all(&frame[half..half + frame.len() / 4])?;
            return Err(io::Error::other("injected append failure").into());
        }

        w.writer.write_all(frame)?;
        w.writer.flush()?;
        if self.sync_mode == SyncMode::EveryWrite {
            w.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Throw away whatever a failed append left in the buffer or the file,
    /// putting the writer back at `w.offset`.
    fn discard_tail(&self, w: &mut WalWriter) -> StoreResult<()> {
        // `into_parts` hands back the unwritten buffer instead of flushing it.
        let spare = BufWriter::new(w.writer.get_ref().try_clone()?);
        let (_file, _unwritten) = std::mem::replace(&mut w.writer, spare).into_parts();

        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(w.offset)?;
        file.sync_all()?;
        drop(file);

        let (writer, offset) = Self::open_writer(&self.path)?;
        w.writer = writer;
        w.offset = offset;

        debug!(len = offset, "WAL partial frame discarded");
        Ok(())
    }

    /// Make the next append fail after writing part of its frame.
    #[cfg(test)]
    pub(crate) fn fail_next_append(&self) {
        self.fail_next_append.store(true, Ordering::SeqCst);
    }

    /// Recover all valid entries from the log.
    ///
    /// Entries that fail CRC validation are logged and skipped. An entry
    /// whose declared length runs past the end of the file is a torn write
    /// and stops recovery.
    pub fn recover(&self) -> StoreResult<Recovery> {
        let mut file = BufReader::new(File::open(&self.path)?);
        let file_len = file.get_ref().metadata()?.len();
        let mut entries = Vec::new();
        let mut offset: u64 = 0;

        while offset + HEADER_SIZE as u64 <= file_len {
            file.seek(SeekFrom::Start(offset))?;

            let mut header_buf = [0u8; HEADER_SIZE];
            match file.read_exact(&mut header_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header_buf[0], header_buf[1], header_buf[2], header_buf[3]]);
            let expected_crc = u32::from_le_bytes([header_buf[4], header_buf[5], header_buf[6], header_buf[7]]);

            if length == 0 || (offset + HEADER_SIZE as u64 + length as u64) > file_len {
                warn!(
                    offset,
                    length,
                    file_len,
                    "invalid WAL entry length; stopping recovery"
                );
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match file.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(offset, "truncated WAL entry; stopping recovery");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "CRC mismatch; skipping entry"
                );
                offset += HEADER_SIZE as u64 + length as u64;
                continue;
            }

            match bincode::deserialize::<Vec<Mutation>>(&payload) {
                Ok(mutations) => entries.push(WalEntry { mutations }),
                Err(e) => {
                    warn!(offset, error = %e, "failed to deserialize WAL entry; skipping");
                }
            }

            offset += HEADER_SIZE as u64 + length as u64;
        }

        debug!(recovered = entries.len(), valid_len = offset, "WAL recovery complete");
        Ok(Recovery {
            entries,
            valid_len: offset,
        })
    }

    /// Cut the file back to `len` bytes, discarding a torn tail so later
    /// appends land on a frame boundary.
    pub fn truncate_to(&self, len: u64) -> StoreResult<()> {
        let mut w = self.writer.lock().expect("WAL mutex poisoned");
        w.writer.flush()?;

        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(len)?;
        file.sync_all()?;
        drop(file);

        let (writer, offset) = Self::open_writer(&self.path)?;
        w.writer = writer;
        w.offset = offset;

        debug!(len, "WAL truncated");
        Ok(())
    }

    /// Replace the whole log with `entries`.
    ///
    /// The new log is written to a sibling temp file, synced, and renamed
    /// over the old one, so a crash mid-rewrite leaves the old log intact.
    pub fn rewrite(&self, entries: &[WalEntry]) -> StoreResult<()> {
        let tmp_path = self.path.with_extension("wal.rewrite");
        let mut w = self.writer.lock().expect("WAL mutex poisoned");
        w.writer.flush()?;

        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            let mut buf_writer = BufWriter::new(file);
            for entry in entries {
                buf_writer.write_all(&encode_frame(entry)?)?;
            }
            buf_writer.flush()?;
            buf_writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        let (writer, offset) = Self::open_writer(&self.path)?;
        w.writer = writer;
        w.offset = offset;
        w.failed = None;

        debug!(entries = entries.len(), len = offset, "WAL rewritten");
        Ok(())
    }

    /// Current write offset (the log's size in bytes).
    pub fn offset(&self) -> u64 {
        self.writer.lock().expect("WAL mutex poisoned").offset
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for WriteAheadLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteAheadLog")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .finish()
    }
}

fn encode_frame(entry: &WalEntry) -> StoreResult<Vec<u8>> {
    let payload = bincode::serialize(&entry.mutations)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization(format!("entry too large: {} bytes", payload.len())))?;
    let crc = crc32fast::hash(&payload);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nest_types::{CommentRecord, Timestamp};

    fn record(id: &str) -> CommentRecord {
        CommentRecord {
            id: id.into(),
            content: format!("body {id}"),
            created_at: Timestamp::from("2024-01-01T00:00:00.000Z"),
            parent_id: None,
        }
    }

    fn put_entry(id: &str) -> WalEntry {
        WalEntry {
            mutations: vec![Mutation::Put(record(id))],
        }
    }

    #[test]
    fn append_and_recover() {
        let dir = tempfile::tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("c.wal"), SyncMode::default()).unwrap();

        let first = put_entry("1");
        let second = WalEntry {
            mutations: vec![Mutation::Put(record("2")), Mutation::Delete("1".into())],
        };
        wal.append(&first).unwrap();
        wal.append(&second).unwrap();

        let recovery = wal.recover().unwrap();
        assert_eq!(recovery.entries, vec![first, second]);
        assert_eq!(recovery.valid_len, wal.offset());
    }

    #[test]
    fn recover_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("empty.wal"), SyncMode::OsDefault).unwrap();
        let recovery = wal.recover().unwrap();
        assert!(recovery.entries.is_empty());
        assert_eq!(recovery.valid_len, 0);
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("c.wal");
        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        assert!(path.exists());
        assert_eq!(wal.offset(), 0);
    }

    #[test]
    fn crc_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.wal");
        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        wal.append(&put_entry("1")).unwrap();
        wal.append(&put_entry("2")).unwrap();
        drop(wal);

        {
            let mut file = OpenOptions::new().write(true).read(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            file.write_all(&buf).unwrap();
            file.sync_all().unwrap();
        }

        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        let recovery = wal.recover().unwrap();
        assert_eq!(recovery.entries, vec![put_entry("2")]);
    }

    #[test]
    fn torn_tail_is_reported_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.wal");
        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        let second_offset = {
            wal.append(&put_entry("1")).unwrap();
            wal.append(&put_entry("2")).unwrap()
        };
        let total_len = wal.offset();
        drop(wal);

        {
            let file = OpenOptions::new().write(true).open(&path).unwrap();
            file.set_len(total_len - 4).unwrap();
        }

        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        let recovery = wal.recover().unwrap();
        assert_eq!(recovery.entries, vec![put_entry("1")]);
        assert_eq!(recovery.valid_len, second_offset);

        wal.truncate_to(recovery.valid_len).unwrap();
        assert_eq!(wal.offset(), second_offset);
        wal.append(&put_entry("3")).unwrap();

        let recovery = wal.recover().unwrap();
        assert_eq!(recovery.entries, vec![put_entry("1"), put_entry("3")]);
    }

    #[test]
    fn rewrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rw.wal");
        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        for i in 0..5 {
            wal.append(&put_entry(&i.to_string())).unwrap();
        }
        let before = wal.offset();

        wal.rewrite(&[put_entry("only")]).unwrap();
        assert!(wal.offset() < before);
        assert!(!path.with_extension("wal.rewrite").exists());

        wal.append(&put_entry("after")).unwrap();
        let recovery = wal.recover().unwrap();
        assert_eq!(recovery.entries, vec![put_entry("only"), put_entry("after")]);
    }

    #[test]
    fn append_returns_increasing_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("o.wal"), SyncMode::OsDefault).unwrap();
        let off1 = wal.append(&put_entry("1")).unwrap();
        let off2 = wal.append(&put_entry("2")).unwrap();
        assert_eq!(off1, 0);
        assert!(off2 > off1);
    }

    #[test]
    fn failed_append_leaves_no_partial_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fail.wal");
        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        wal.append(&put_entry("1")).unwrap();
        let size = wal.offset();

        wal.fail_next_append();
        assert!(wal.append(&put_entry("lost")).is_err());
        assert_eq!(wal.offset(), size);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), size);

        for id in ["2", "3", "4", "5"] {
            wal.append(&put_entry(id)).unwrap();
        }
        drop(wal);

        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        let recovery = wal.recover().unwrap();
        let expected: Vec<WalEntry> = ["1", "2", "3", "4", "5"].into_iter().map(put_entry).collect();
        assert_eq!(recovery.entries, expected);
        assert_eq!(recovery.valid_len, wal.offset());
    }

    #[test]
    fn unrepairable_append_closes_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.wal");
        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        wal.append(&put_entry("1")).unwrap();

        // With the file unlinked the partial frame cannot be cut back off.
        std::fs::remove_file(&path).unwrap();
        wal.fail_next_append();
        assert!(matches!(wal.append(&put_entry("2")), Err(StoreError::Io(_))));
        assert!(matches!(
            wal.append(&put_entry("3")),
            Err(StoreError::Unavailable(_))
        ));

        // A rewrite produces a known-good file and reopens the log.
        wal.rewrite(&[put_entry("1")]).unwrap();
        wal.append(&put_entry("4")).unwrap();
        let recovery = wal.recover().unwrap();
        assert_eq!(recovery.entries, vec![put_entry("1"), put_entry("4")]);
    }
}
