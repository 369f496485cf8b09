//! Directory-backed backend.
//!
//! Each key lives in its own entry file named by the SHA-256 of the key. An
//! entry file holds a small header, the key, the value and a CRC32 over both,
//! so torn or foreign files are detected on read instead of being served.

use fs2::FileExt;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::backend::{entry_size, StorageBackend, StorageUsage};
use crate::config::StorageConfig;
use crate::error::{DraftError, Result};

/// Magic bytes for entry files.
const ENTRY_MAGIC: &[u8; 4] = b"FKV\0";

/// Current entry format version.
const ENTRY_VERSION: u8 = 1;

const ENTRY_EXT: &str = "kv";

const TMP_EXT: &str = "tmp";

/// Magic, version, key length, value length and trailing CRC.
const ENTRY_OVERHEAD: u64 = 4 + 1 + 2 + 8 + 4;

/// Longest key the entry header can describe.
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Options for opening a `FileStorage`.
#[derive(Clone, Debug)]
pub struct FileStorageOptions {
    /// Number of values kept in the read cache.
    pub cache_size: usize,
    /// Byte limit over keys and values, if any.
    pub quota_bytes: Option<u64>,
    /// Create the directory if it does not exist.
    pub create_if_missing: bool,
}

impl Default for FileStorageOptions {
    fn default() -> Self {
        Self {
            cache_size: 64,
            quota_bytes: Some(super::memory::DEFAULT_QUOTA_BYTES),
            create_if_missing: true,
        }
    }
}

impl From<&StorageConfig> for FileStorageOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            cache_size: config.cache_size,
            quota_bytes: config.quota_bytes,
            create_if_missing: true,
        }
    }
}

struct IndexEntry {
    size: u64,
    seq: u64,
}

#[derive(Default)]
struct FileIndex {
    entries: HashMap<String, IndexEntry>,
    next_seq: u64,
    used: u64,
}

/// Key/value storage in a directory, one checksummed file per key.
pub struct FileStorage {
    path: PathBuf,
    quota: Option<u64>,

    /// Held for exclusive access to the directory.
    _lock_file: File,

    index: Mutex<FileIndex>,
    cache: Mutex<LruCache<String, String>>,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>, options: FileStorageOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            if !options.create_if_missing {
                return Err(DraftError::StorageUnavailable);
            }
            fs::create_dir_all(&path)?;
        }

        let lock_file = Self::acquire_lock(&path)?;
        let index = Self::scan(&path)?;
        debug!(
            path = %path.display(),
            entries = index.entries.len(),
            bytes = index.used,
            "file storage opened"
        );

        let cache_size = NonZeroUsize::new(options.cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            path,
            quota: options.quota_bytes,
            _lock_file: lock_file,
            index: Mutex::new(index),
            cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| DraftError::Locked)?;
        Ok(lock_file)
    }

    /// Rebuild the in-memory index from the entry files, oldest first.
    fn scan(path: &Path) -> Result<FileIndex> {
        let mut found = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();
            let ext = file_path.extension().and_then(|e| e.to_str());
            if ext == Some(TMP_EXT) {
                // Left behind by an interrupted write.
                match fs::remove_file(&file_path) {
                    Ok(()) => debug!(file = %file_path.display(), "removed stale temp file"),
                    Err(e) => warn!(file = %file_path.display(), error = %e, "failed to remove temp file"),
                }
                continue;
            }
            if ext != Some(ENTRY_EXT) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            match read_entry(&file_path) {
                Ok((key, value)) => found.push((modified, key, value.len() as u64)),
                Err(e) => {
                    warn!(file = %file_path.display(), error = %e, "skipping unreadable entry");
                }
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut index = FileIndex::default();
        for (_, key, value_len) in found {
            let size = key.len() as u64 + value_len;
            index.used += size;
            index.entries.insert(
                key,
                IndexEntry {
                    size,
                    seq: index.next_seq,
                },
            );
            index.next_seq += 1;
        }
        Ok(index)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.path
            .join(format!("{}.{}", hex::encode(digest), ENTRY_EXT))
    }

    fn write_entry(&self, key: &str, value: &str) -> io::Result<()> {
        let final_path = self.entry_path(key);
        let tmp_path = final_path.with_extension(TMP_EXT);

        let mut file = File::create(&tmp_path)?;

        // Header
        file.write_all(ENTRY_MAGIC)?;
        file.write_all(&[ENTRY_VERSION])?;

        // Key
        let key_bytes = key.as_bytes();
        file.write_all(&(key_bytes.len() as u16).to_le_bytes())?;
        file.write_all(key_bytes)?;

        // Value
        let value_bytes = value.as_bytes();
        file.write_all(&(value_bytes.len() as u64).to_le_bytes())?;
        file.write_all(value_bytes)?;

        // Checksum over key and value
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(key_bytes);
        hasher.update(value_bytes);
        file.write_all(&hasher.finalize().to_le_bytes())?;

        file.sync_all()?;
        fs::rename(&tmp_path, &final_path)
    }
}

/// Read and verify one entry file, returning `(key, value)`.
fn read_entry(path: &Path) -> Result<(String, String)> {
    let corrupt = |reason: String| DraftError::corrupt(path.display().to_string(), reason);
    let eof = |e: io::Error| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DraftError::corrupt(path.display().to_string(), "truncated entry")
        } else {
            DraftError::Io(e)
        }
    };

    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();
    if file_len < ENTRY_OVERHEAD {
        return Err(corrupt("truncated entry".into()));
    }

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).map_err(eof)?;
    if &magic != ENTRY_MAGIC {
        return Err(corrupt("invalid entry magic".into()));
    }

    let mut version = [0u8; 1];
    file.read_exact(&mut version).map_err(eof)?;
    if version[0] != ENTRY_VERSION {
        return Err(corrupt(format!("unsupported entry version: {}", version[0])));
    }

    let mut key_len = [0u8; 2];
    file.read_exact(&mut key_len).map_err(eof)?;
    let key_len = u16::from_le_bytes(key_len) as u64;
    if ENTRY_OVERHEAD + key_len > file_len {
        return Err(corrupt("truncated entry".into()));
    }
    let mut key_bytes = vec![0u8; key_len as usize];
    file.read_exact(&mut key_bytes).map_err(eof)?;

    let mut value_len = [0u8; 8];
    file.read_exact(&mut value_len).map_err(eof)?;
    // Lengths must account for the whole file before anything is allocated.
    let value_len = u64::from_le_bytes(value_len);
    if (ENTRY_OVERHEAD + key_len).checked_add(value_len) != Some(file_len) {
        return Err(corrupt("truncated entry".into()));
    }
    let mut value_bytes = vec![0u8; value_len as usize];
    file.read_exact(&mut value_bytes).map_err(eof)?;

    let mut checksum = [0u8; 4];
    file.read_exact(&mut checksum).map_err(eof)?;
    let stored = u32::from_le_bytes(checksum);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&key_bytes);
    hasher.update(&value_bytes);
    let computed = hasher.finalize();
    if stored != computed {
        return Err(corrupt(format!(
            "checksum mismatch: expected {}, got {}",
            stored, computed
        )));
    }

    let key = String::from_utf8(key_bytes).map_err(|e| corrupt(e.to_string()))?;
    let value = String::from_utf8(value_bytes).map_err(|e| corrupt(e.to_string()))?;
    Ok((key, value))
}

impl StorageBackend for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.cache.lock().get(key).cloned() {
            return Ok(Some(value));
        }

        if !self.index.lock().entries.contains_key(key) {
            return Ok(None);
        }

        let (stored_key, value) = read_entry(&self.entry_path(key))?;
        if stored_key != key {
            return Err(DraftError::corrupt(key, "entry belongs to a different key"));
        }

        self.cache.lock().put(key.to_string(), value.clone());
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if key.len() > MAX_KEY_LEN {
            return Err(DraftError::Transient(format!(
                "key of {} bytes exceeds the {} byte limit",
                key.len(),
                MAX_KEY_LEN
            )));
        }
        let needed = entry_size(key, value);
        let mut index = self.index.lock();

        let old = index.entries.get(key).map(|e| e.size).unwrap_or(0);
        let base = index.used - old;
        if let Some(quota) = self.quota {
            if base + needed > quota {
                return Err(DraftError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available: quota.saturating_sub(base),
                });
            }
        }

        if let Err(e) = self.write_entry(key, value) {
            if e.kind() == io::ErrorKind::StorageFull {
                return Err(DraftError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available: 0,
                });
            }
            return Err(DraftError::Io(e));
        }

        let seq = index.next_seq;
        index.next_seq += 1;
        index.used = base + needed;
        index
            .entries
            .insert(key.to_string(), IndexEntry { size: needed, seq });
        drop(index);

        self.cache.lock().put(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.cache.lock().pop(key);

        let mut index = self.index.lock();
        if let Some(entry) = index.entries.remove(key) {
            index.used -= entry.size;
            let path = self.entry_path(key);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.cache.lock().clear();

        let mut index = self.index.lock();
        let keys: Vec<String> = index.entries.keys().cloned().collect();
        for key in keys {
            let path = self.entry_path(&key);
            if path.exists() {
                fs::remove_file(path)?;
            }
            if let Some(entry) = index.entries.remove(&key) {
                index.used -= entry.size;
            }
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let index = self.index.lock();
        let mut keyed: Vec<(u64, &String)> =
            index.entries.iter().map(|(k, e)| (e.seq, k)).collect();
        keyed.sort_unstable();
        Ok(keyed.into_iter().map(|(_, k)| k.clone()).collect())
    }

    fn usage(&self) -> Result<StorageUsage> {
        let index = self.index.lock();
        Ok(StorageUsage {
            used_bytes: index.used,
            quota_bytes: self.quota,
            entries: index.entries.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> FileStorage {
        FileStorage::open(dir.path().join("kv"), FileStorageOptions::default()).unwrap()
    }

    #[test]
    fn test_store_and_retrieve() {
        let dir = TempDir::new().unwrap();
        let storage = open(&dir);

        storage.set("document:a", "{\"x\":1}").unwrap();
        assert_eq!(
            storage.get("document:a").unwrap().as_deref(),
            Some("{\"x\":1}")
        );
        assert!(storage.get("document:b").unwrap().is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let storage = open(&dir);
            storage.set("one", "1").unwrap();
            storage.set("two", "22").unwrap();
        }

        let storage = open(&dir);
        assert_eq!(storage.get("two").unwrap().as_deref(), Some("22"));
        let usage = storage.usage().unwrap();
        assert_eq!(usage.entries, 2);
        assert_eq!(usage.used_bytes, 3 + 1 + 3 + 2);
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _first = open(&dir);
        let second = FileStorage::open(dir.path().join("kv"), FileStorageOptions::default());
        assert!(matches!(second, Err(DraftError::Locked)));
    }

    #[test]
    fn test_detects_corrupted_entry() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(
            dir.path().join("kv"),
            FileStorageOptions {
                cache_size: 1,
                ..Default::default()
            },
        )
        .unwrap();
        storage.set("victim", "hello world").unwrap();
        // Push the victim out of the one-slot cache
        storage.set("other", "x").unwrap();

        let path = storage.entry_path("victim");
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 6;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let err = storage.get("victim").unwrap_err();
        assert!(matches!(err, DraftError::CorruptRecord { .. }));
    }

    #[test]
    fn test_rejects_oversized_key() {
        let dir = TempDir::new().unwrap();
        let storage = open(&dir);
        let key = format!("document:{}", "k".repeat(70_000));

        let err = storage.set(&key, "{}").unwrap_err();
        assert!(matches!(err, DraftError::Transient(_)));
        assert!(storage.get(&key).unwrap().is_none());
        assert_eq!(storage.usage().unwrap().entries, 0);

        let longest = "k".repeat(MAX_KEY_LEN);
        storage.set(&longest, "{}").unwrap();
        storage.cache.lock().clear();
        assert_eq!(storage.get(&longest).unwrap().as_deref(), Some("{}"));
    }

    fn write_raw_entry(dir: &Path, name: &str, key_len: u16, value_len: u64, tail: &[u8]) {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(ENTRY_MAGIC);
        bytes.push(ENTRY_VERSION);
        bytes.extend_from_slice(&key_len.to_le_bytes());
        bytes.extend_from_slice(&value_len.to_le_bytes());
        bytes.extend_from_slice(tail);
        fs::write(dir.join(name), bytes).unwrap();
    }

    #[test]
    fn test_open_skips_entries_with_bad_lengths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv");
        {
            let storage = FileStorage::open(&path, FileStorageOptions::default()).unwrap();
            storage.set("good", "value").unwrap();
        }

        write_raw_entry(&path, "deadbeef.kv", 0, u64::MAX, &[]);
        write_raw_entry(&path, "feedface.kv", u16::MAX, 4, b"abcd0000");
        write_raw_entry(&path, "cafebabe.kv", 0, 1_000, &[0u8; 12]);

        let storage = open(&dir);
        assert_eq!(storage.keys().unwrap(), vec!["good"]);
        assert_eq!(storage.get("good").unwrap().as_deref(), Some("value"));

        let err = read_entry(&path.join("deadbeef.kv")).unwrap_err();
        assert!(matches!(err, DraftError::CorruptRecord { .. }));
    }

    #[test]
    fn test_get_rejects_damaged_length() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(
            dir.path().join("kv"),
            FileStorageOptions {
                cache_size: 1,
                ..Default::default()
            },
        )
        .unwrap();
        storage.set("victim", "hello").unwrap();
        storage.set("other", "x").unwrap();

        // Value length field sits after magic, version, key length and key
        let path = storage.entry_path("victim");
        let mut bytes = fs::read(&path).unwrap();
        let at = 4 + 1 + 2 + "victim".len();
        bytes[at..at + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        fs::write(&path, bytes).unwrap();

        let err = storage.get("victim").unwrap_err();
        assert!(matches!(err, DraftError::CorruptRecord { .. }));
    }

    #[test]
    fn test_open_removes_stale_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv");
        fs::create_dir_all(&path).unwrap();
        let stale = path.join("0123abcd.tmp");
        fs::write(&stale, b"partial").unwrap();

        let storage = FileStorage::open(&path, FileStorageOptions::default()).unwrap();
        assert!(!stale.exists());
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_quota_and_remove() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(
            dir.path().join("kv"),
            FileStorageOptions {
                quota_bytes: Some(16),
                ..Default::default()
            },
        )
        .unwrap();

        storage.set("k1", "0123456789").unwrap();
        let err = storage.set("k2", "0123456789").unwrap_err();
        assert!(err.is_quota_exceeded());

        storage.remove("k1").unwrap();
        storage.set("k2", "0123456789").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["k2"]);

        storage.clear().unwrap();
        assert_eq!(storage.usage().unwrap().used_bytes, 0);
    }
}
