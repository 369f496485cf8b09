//! Durable key/value storage.
//!
//! `StorageBackend` is the host facility (local storage, a directory, or
//! nothing at all). `StorageAdapter` is the single gateway the rest of the
//! crate uses; it probes availability, classifies failures and runs quota
//! cleanup.

mod adapter;
mod backend;
mod file;
mod memory;

pub use adapter::{ReclaimReport, StorageAdapter};
pub use backend::{StorageBackend, StorageUsage, UnavailableStorage};
pub use file::{FileStorage, FileStorageOptions};
pub use memory::{MemoryStorage, DEFAULT_QUOTA_BYTES};

/// Storage key layout.
pub mod keys {
    use crate::types::DocumentId;

    pub const DOCUMENT_PREFIX: &str = "document:";
    pub const VERSIONS_PREFIX: &str = "versions:";

    /// Key of a document's persistence record.
    pub fn document_key(id: &DocumentId) -> String {
        format!("{}{}", DOCUMENT_PREFIX, id)
    }

    /// Key of a document's version history.
    pub fn versions_key(id: &DocumentId) -> String {
        format!("{}{}", VERSIONS_PREFIX, id)
    }
}
