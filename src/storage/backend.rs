//! Host key/value storage backends.

use crate::error::{DraftError, Result};

/// Space accounting for a backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StorageUsage {
    /// Bytes used by keys and values.
    pub used_bytes: u64,
    /// Byte limit, if the backend enforces one.
    pub quota_bytes: Option<u64>,
    /// Number of stored entries.
    pub entries: usize,
}

impl StorageUsage {
    /// Bytes still free under the quota.
    pub fn available(&self) -> Option<u64> {
        self.quota_bytes
            .map(|q| q.saturating_sub(self.used_bytes))
    }
}

/// Synchronous string key/value storage, in the shape of browser local storage.
///
/// Implementations use interior locking so one backend can be shared behind
/// an `Arc`. Quota failures must surface as `DraftError::QuotaExceeded` so the
/// adapter can tell them apart from other failures.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// All keys, least recently written first.
    fn keys(&self) -> Result<Vec<String>>;

    fn usage(&self) -> Result<StorageUsage>;
}

/// Backend for hosts where storage is disabled. Every call fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableStorage;

impl StorageBackend for UnavailableStorage {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(DraftError::StorageUnavailable)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(DraftError::StorageUnavailable)
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Err(DraftError::StorageUnavailable)
    }

    fn clear(&self) -> Result<()> {
        Err(DraftError::StorageUnavailable)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Err(DraftError::StorageUnavailable)
    }

    fn usage(&self) -> Result<StorageUsage> {
        Err(DraftError::StorageUnavailable)
    }
}

/// Size charged against the quota for one entry.
pub(crate) fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
