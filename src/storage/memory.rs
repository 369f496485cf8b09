//! In-memory backend with a byte quota.

use parking_lot::Mutex;
use std::collections::HashMap;

use super::backend::{entry_size, StorageBackend, StorageUsage};
use crate::config::StorageConfig;
use crate::error::{DraftError, Result};

/// Browser local storage typically allows around 5 MiB per origin.
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

struct MemoryEntry {
    value: String,
    /// Write order, for oldest-first key listing.
    seq: u64,
}

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, MemoryEntry>,
    next_seq: u64,
    used: u64,
}

/// Key/value storage held in process memory.
pub struct MemoryStorage {
    quota: Option<u64>,
    inner: Mutex<MemoryInner>,
}

impl MemoryStorage {
    /// Storage with the default quota.
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            quota: Some(quota_bytes),
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            quota: None,
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    /// Storage with the configured quota.
    pub fn from_config(config: &StorageConfig) -> Self {
        match config.quota_bytes {
            Some(quota) => Self::with_quota(quota),
            None => Self::unbounded(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().entries.get(key).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock();

        let old = inner
            .entries
            .get(key)
            .map(|e| entry_size(key, &e.value))
            .unwrap_or(0);
        let needed = entry_size(key, value);
        let base = inner.used - old;

        if let Some(quota) = self.quota {
            if base + needed > quota {
                return Err(DraftError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available: quota.saturating_sub(base),
                });
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.used = base + needed;
        inner.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                seq,
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.remove(key) {
            inner.used -= entry_size(key, &entry.value);
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.used = 0;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock();
        let mut keyed: Vec<(u64, &String)> =
            inner.entries.iter().map(|(k, e)| (e.seq, k)).collect();
        keyed.sort_unstable();
        Ok(keyed.into_iter().map(|(_, k)| k.clone()).collect())
    }

    fn usage(&self) -> Result<StorageUsage> {
        let inner = self.inner.lock();
        Ok(StorageUsage {
            used_bytes: inner.used,
            quota_bytes: self.quota,
            entries: inner.entries.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let storage = MemoryStorage::new();
        storage.set("a", "1").unwrap();
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("1"));
        storage.remove("a").unwrap();
        storage.remove("a").unwrap();
        assert!(storage.get("a").unwrap().is_none());
        assert_eq!(storage.usage().unwrap().used_bytes, 0);
    }

    #[test]
    fn test_quota_exceeded_leaves_previous_value() {
        let storage = MemoryStorage::with_quota(10);
        storage.set("k", "12345").unwrap();

        let err = storage.set("k", "1234567890").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("12345"));

        // Overwriting frees the old entry's space first
        storage.set("k", "123456789").unwrap();
        assert_eq!(storage.usage().unwrap().used_bytes, 10);
        assert_eq!(storage.usage().unwrap().available(), Some(0));
    }

    #[test]
    fn test_keys_oldest_write_first() {
        let storage = MemoryStorage::unbounded();
        storage.set("a", "1").unwrap();
        storage.set("b", "1").unwrap();
        storage.set("c", "1").unwrap();
        storage.set("a", "2").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["b", "c", "a"]);
    }
}
