//! The storage adapter: the only code that talks to a backend.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::backend::{StorageBackend, StorageUsage};
use super::keys::{DOCUMENT_PREFIX, VERSIONS_PREFIX};
use crate::config::StorageConfig;
use crate::error::{DraftError, Result};

const PROBE_KEY: &str = "__storage_test__";

/// Outcome of a quota cleanup pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Keys removed, oldest first.
    pub removed: Vec<String>,
    /// Bytes released.
    pub freed_bytes: u64,
}

/// Wraps a backend and normalizes its failure modes.
///
/// If the availability probe fails at construction the adapter goes into
/// memory-only mode: every call returns `StorageUnavailable` and the backend
/// is never touched again.
pub struct StorageAdapter {
    backend: Box<dyn StorageBackend>,
    available: bool,
    essential_prefixes: Vec<String>,
    max_evictions: usize,
}

impl StorageAdapter {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self::with_config(backend, &StorageConfig::default())
    }

    pub fn with_config(backend: impl StorageBackend + 'static, config: &StorageConfig) -> Self {
        let available = Self::probe(&backend);
        if available {
            debug!("storage available");
        } else {
            warn!("storage unavailable, running in memory-only mode");
        }

        Self {
            backend: Box::new(backend),
            available,
            essential_prefixes: config.essential_prefixes.clone(),
            max_evictions: config.reclaim_max_evictions,
        }
    }

    /// Write, read back and remove a test key.
    fn probe(backend: &dyn StorageBackend) -> bool {
        let marker = "probe";
        let ok = backend.set(PROBE_KEY, marker).is_ok()
            && matches!(backend.get(PROBE_KEY), Ok(Some(ref v)) if v == marker);
        let _ = backend.remove(PROBE_KEY);
        ok
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    fn backend(&self) -> Result<&dyn StorageBackend> {
        if self.available {
            Ok(self.backend.as_ref())
        } else {
            Err(DraftError::StorageUnavailable)
        }
    }

    // --- Raw Operations ---

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.backend()?.get(key).inspect_err(|e| {
            warn!(key, error = %e, "storage read failed");
        })
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        match self.backend()?.set(key, value) {
            Ok(()) => Ok(()),
            Err(e) if e.is_quota_exceeded() => {
                error!(key, bytes = value.len(), error = %e, "storage quota exceeded");
                Err(e)
            }
            Err(e) => {
                warn!(key, error = %e, "storage write failed");
                Err(e)
            }
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.backend()?.remove(key)
    }

    pub fn clear(&self) -> Result<()> {
        info!("clearing storage");
        self.backend()?.clear()
    }

    /// Keys, least recently written first.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.backend()?.keys()
    }

    pub fn usage(&self) -> Result<StorageUsage> {
        self.backend()?.usage()
    }

    // --- JSON Helpers ---

    /// Read and decode a JSON value. Undecodable data is a `CorruptRecord`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| DraftError::corrupt(key, e.to_string())),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }

    // --- Maintenance ---

    fn is_essential(&self, key: &str) -> bool {
        self.essential_prefixes
            .iter()
            .any(|p| key.starts_with(p.as_str()))
    }

    /// Free space after a quota failure by removing the oldest non-essential
    /// keys. Removes at most the configured number of keys per call.
    pub fn reclaim(&self) -> Result<ReclaimReport> {
        let backend = self.backend()?;
        let mut report = ReclaimReport::default();

        for key in backend.keys()? {
            if report.removed.len() >= self.max_evictions {
                break;
            }
            if key == PROBE_KEY || self.is_essential(&key) {
                continue;
            }

            let size = backend
                .get(&key)?
                .map(|v| (key.len() + v.len()) as u64)
                .unwrap_or(0);
            backend.remove(&key)?;
            report.freed_bytes += size;
            report.removed.push(key);
        }

        info!(
            removed = report.removed.len(),
            bytes = report.freed_bytes,
            "storage reclaim finished"
        );
        Ok(report)
    }

    /// Remove entries under this crate's prefixes whose values are not JSON.
    ///
    /// Returns the removed keys.
    pub fn repair(&self) -> Result<Vec<String>> {
        let backend = self.backend()?;
        let mut removed = Vec::new();

        for key in backend.keys()? {
            if !(key.starts_with(DOCUMENT_PREFIX) || key.starts_with(VERSIONS_PREFIX)) {
                continue;
            }
            let broken = match backend.get(&key) {
                Ok(Some(raw)) => serde_json::from_str::<serde_json::Value>(&raw).is_err(),
                Ok(None) => false,
                Err(e) => matches!(e, DraftError::CorruptRecord { .. }),
            };
            if broken {
                warn!(key = %key, "removing unparseable entry");
                backend.remove(&key)?;
                removed.push(key);
            }
        }
        Ok(removed)
    }
}
