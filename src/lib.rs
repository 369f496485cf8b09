//! # Funnel Drafts
//!
//! Local persistence and version history for a funnel page editor.
//!
//! ## Core Concepts
//!
//! - **Draft**: the in-memory document, replaced by value on every edit
//! - **Persister**: debounced, rate-limited writes of the draft to storage
//! - **History**: a bounded list of immutable document snapshots
//! - **Storage**: a key/value adapter that survives quota and availability failures
//!
//! ## Example
//!
//! ```ignore
//! use funnel_drafts::{EditorConfig, EditorSession, MemoryStorage, StorageAdapter, BlockKind};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageAdapter::new(MemoryStorage::new()));
//! let mut session = EditorSession::open(EditorConfig::default(), storage, "quiz".into())?;
//!
//! let page = session.document().pages[0].id.clone();
//! let block = session.add_block(&page, BlockKind::Text);
//!
//! // From the host's event loop
//! session.tick();
//!
//! session.save_version("Before redesign", "")?;
//! ```

pub mod config;
pub mod document;
pub mod draft;
pub mod error;
pub mod history;
pub mod persistence;
pub mod session;
pub mod status;
pub mod storage;
pub mod types;

// Re-exports
pub use config::{EditorConfig, HistoryConfig, PersisterConfig, StorageConfig};
pub use document::{default_funnel, Block, BlockKind, Document, Page, Properties};
pub use draft::DraftStore;
pub use error::{DraftError, ErrorKind, Result};
pub use history::{VersionHistory, VersionMetadata, VersionSnapshot};
pub use persistence::{
    Clock, DebouncedPersister, ManualClock, PersistenceRecord, PersisterStats, SaveOutcome,
    SaveTrigger, SystemClock,
};
pub use session::{AutosaveDriver, EditorSession, Recovery};
pub use status::{SaveStatus, StatusBroadcaster, StatusEvent, StatusSubscription};
pub use storage::{
    FileStorage, FileStorageOptions, MemoryStorage, ReclaimReport, StorageAdapter, StorageBackend,
    StorageUsage, UnavailableStorage,
};
pub use types::*;
