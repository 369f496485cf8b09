//! Error types for draft persistence.

use crate::types::SnapshotId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for storage, persistence and history operations.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A single read or write failed but storage is otherwise usable.
    #[error("Transient storage error: {0}")]
    Transient(String),

    #[error("Storage quota exceeded writing {key}: needed {needed} bytes, {available} available")]
    QuotaExceeded {
        key: String,
        needed: u64,
        available: u64,
    },

    #[error("Corrupt record at {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("Storage is unavailable")]
    StorageUnavailable,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage is locked by another process")]
    Locked,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A snapshot was kept in memory but could not be written to storage.
    #[error("Snapshot {snapshot} was not persisted: {source}")]
    NotPersisted {
        snapshot: SnapshotId,
        #[source]
        source: Box<DraftError>,
    },
}

/// Coarse classification used to pick a recovery policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    QuotaExceeded,
    CorruptRecord,
    StorageUnavailable,
    Other,
}

impl DraftError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DraftError::Transient(_) | DraftError::Serialization(_) | DraftError::Locked => {
                ErrorKind::Transient
            }
            DraftError::Io(e) if e.kind() == std::io::ErrorKind::StorageFull => {
                ErrorKind::QuotaExceeded
            }
            DraftError::Io(_) => ErrorKind::Transient,
            DraftError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            DraftError::CorruptRecord { .. } => ErrorKind::CorruptRecord,
            DraftError::StorageUnavailable => ErrorKind::StorageUnavailable,
            DraftError::InvalidConfig(_) => ErrorKind::Other,
            DraftError::NotPersisted { source, .. } => source.kind(),
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        self.kind() == ErrorKind::QuotaExceeded
    }

    pub(crate) fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        DraftError::CorruptRecord {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for DraftError {
    fn from(e: serde_json::Error) -> Self {
        DraftError::Serialization(e.to_string())
    }
}

/// Result type for draft operations.
pub type Result<T> = std::result::Result<T, DraftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(DraftError::StorageUnavailable.kind(), ErrorKind::StorageUnavailable);
        assert_eq!(
            DraftError::corrupt("document:a", "truncated").kind(),
            ErrorKind::CorruptRecord
        );
        let quota = DraftError::QuotaExceeded {
            key: "k".into(),
            needed: 10,
            available: 2,
        };
        assert!(quota.is_quota_exceeded());

        let full = DraftError::Io(std::io::Error::from(std::io::ErrorKind::StorageFull));
        assert!(full.is_quota_exceeded());
    }

    #[test]
    fn test_not_persisted_delegates_kind() {
        let err = DraftError::NotPersisted {
            snapshot: SnapshotId::from("abc"),
            source: Box::new(DraftError::StorageUnavailable),
        };
        assert_eq!(err.kind(), ErrorKind::StorageUnavailable);
    }
}
