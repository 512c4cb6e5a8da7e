//! RecordStore trait for abstracting per-recipient record files.
//!
//! This trait allows the session store to work with different backends:
//! - A directory with one file per recipient (`DirectoryStore`)
//! - In-memory (for testing)
//!
//! Implementations only move bytes. Locking, format handling and error
//! policy all live in `SessionStore`.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::StoreConfig;
use crate::state::RecipientId;

/// Abstract per-recipient record storage
pub trait RecordStore {
    /// Read the whole record; `io::ErrorKind::NotFound` when absent
    fn read(&self, recipient_id: RecipientId) -> io::Result<Vec<u8>>;

    /// Write `data` from position 0, creating the record if needed, and
    /// truncate the record to exactly `data.len()` bytes
    fn write(&self, recipient_id: RecipientId, data: &[u8]) -> io::Result<()>;

    /// Remove the record; `io::ErrorKind::NotFound` when absent
    fn delete(&self, recipient_id: RecipientId) -> io::Result<()>;

    fn exists(&self, recipient_id: RecipientId) -> bool;
}

// ============================================================
// DIRECTORY STORE
// ============================================================

/// One file per recipient under `<root>/<sessions_dir>/`
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    dir: PathBuf,
    sync_on_write: bool,
}

impl DirectoryStore {
    /// Open (creating if needed) the sessions directory under `root`
    pub fn open(root: impl AsRef<Path>, config: &StoreConfig) -> io::Result<Self> {
        let dir = root.as_ref().join(config.sessions_dir());
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            sync_on_write: config.sync_on_save(),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for a recipient
    #[must_use]
    pub fn path_for(&self, recipient_id: RecipientId) -> PathBuf {
        self.dir.join(recipient_id.to_string())
    }
}

impl RecordStore for DirectoryStore {
    fn read(&self, recipient_id: RecipientId) -> io::Result<Vec<u8>> {
        fs::read(self.path_for(recipient_id))
    }

    fn write(&self, recipient_id: RecipientId, data: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path_for(recipient_id))?;

        file.seek(SeekFrom::Start(0))?;
        file.write_all(data)?;
        file.set_len(data.len() as u64)?;

        if self.sync_on_write {
            file.sync_all()?;
        }
        Ok(())
    }

    fn delete(&self, recipient_id: RecipientId) -> io::Result<()> {
        fs::remove_file(self.path_for(recipient_id))
    }

    fn exists(&self, recipient_id: RecipientId) -> bool {
        self.path_for(recipient_id).is_file()
    }
}

// ============================================================
// IN-MEMORY STORE
// ============================================================

/// In-memory record store for testing
/// Uses Arc<Mutex<...>> so clones share the same underlying storage
#[derive(Default, Clone)]
pub struct InMemoryStore {
    records: Arc<Mutex<HashMap<RecipientId, Vec<u8>>>>,
    /// Write counters per record (for testing save behaviour)
    write_counts: Arc<Mutex<HashMap<RecipientId, usize>>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of record contents (for testing)
    #[must_use]
    pub fn get_record(&self, recipient_id: RecipientId) -> Option<Vec<u8>> {
        locked(&self.records).get(&recipient_id).cloned()
    }

    /// Replace record contents directly, bypassing the codec (for testing)
    pub fn put_record(&self, recipient_id: RecipientId, data: Vec<u8>) {
        locked(&self.records).insert(recipient_id, data);
    }

    /// Get write count for a record (for testing)
    #[must_use]
    pub fn write_count(&self, recipient_id: RecipientId) -> usize {
        *locked(&self.write_counts).get(&recipient_id).unwrap_or(&0)
    }
}

impl RecordStore for InMemoryStore {
    fn read(&self, recipient_id: RecipientId) -> io::Result<Vec<u8>> {
        locked(&self.records)
            .get(&recipient_id)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such record"))
    }

    fn write(&self, recipient_id: RecipientId, data: &[u8]) -> io::Result<()> {
        let mut records = locked(&self.records);
        let record = records.entry(recipient_id).or_default();

        if record.len() < data.len() {
            record.resize(data.len(), 0);
        }
        record[..data.len()].copy_from_slice(data);
        record.truncate(data.len());

        *locked(&self.write_counts).entry(recipient_id).or_insert(0) += 1;
        Ok(())
    }

    fn delete(&self, recipient_id: RecipientId) -> io::Result<()> {
        locked(&self.records)
            .remove(&recipient_id)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such record"))
    }

    fn exists(&self, recipient_id: RecipientId) -> bool {
        locked(&self.records).contains_key(&recipient_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store_read_write() {
        let store = InMemoryStore::new();
        store.write(1, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(store.read(1).unwrap(), vec![1, 2, 3, 4, 5]);
        assert!(store.exists(1));
        assert!(!store.exists(2));
    }

    #[test]
    fn test_in_memory_store_truncates_on_shorter_write() {
        let store = InMemoryStore::new();
        store.write(1, &[9; 64]).unwrap();
        store.write(1, &[1, 2]).unwrap();
        assert_eq!(store.get_record(1).unwrap(), vec![1, 2]);
        assert_eq!(store.write_count(1), 2);
    }

    #[test]
    fn test_in_memory_store_missing_record() {
        let store = InMemoryStore::new();
        assert_eq!(store.read(7).unwrap_err().kind(), io::ErrorKind::NotFound);
        assert_eq!(store.delete(7).unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_in_memory_store_clones_share_records() {
        let store = InMemoryStore::new();
        let clone = store.clone();
        clone.write(3, b"shared").unwrap();
        assert_eq!(store.read(3).unwrap(), b"shared");
        store.delete(3).unwrap();
        assert!(!clone.exists(3));
    }

    #[test]
    fn test_directory_store_layout() {
        let temp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(temp.path(), &StoreConfig::default()).unwrap();

        store.write(42, b"record").unwrap();

        let path = temp.path().join("sessions").join("42");
        assert_eq!(store.path_for(42), path);
        assert_eq!(fs::read(&path).unwrap(), b"record");
    }

    #[test]
    fn test_directory_store_truncates_on_shorter_write() {
        let temp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(temp.path(), &StoreConfig::default()).unwrap();

        store.write(1, &[0xAA; 128]).unwrap();
        store.write(1, &[0xBB; 8]).unwrap();

        assert_eq!(fs::metadata(store.path_for(1)).unwrap().len(), 8);
        assert_eq!(store.read(1).unwrap(), vec![0xBB; 8]);
    }

    #[test]
    fn test_directory_store_delete() {
        let temp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(temp.path(), &StoreConfig::default()).unwrap();

        store.write(5, b"x").unwrap();
        assert!(store.exists(5));
        store.delete(5).unwrap();
        assert!(!store.exists(5));
        assert_eq!(store.read(5).unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
