//! Bounded version history per document.
//!
//! Snapshots are owned deep copies of a document. The in-memory list is the
//! source of truth for the session; every change is mirrored to
//! `versions:<document id>` as a JSON array, oldest first.

mod manager;
mod types;

pub use manager::VersionHistory;
pub use types::{VersionMetadata, VersionSnapshot, BACKUP_DESCRIPTION};
