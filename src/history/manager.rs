//! Version history manager.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{VersionMetadata, VersionSnapshot, BACKUP_DESCRIPTION};
use crate::config::HistoryConfig;
use crate::document::Document;
use crate::error::{DraftError, Result};
use crate::status::{StatusBroadcaster, StatusEvent};
use crate::storage::keys::versions_key;
use crate::storage::StorageAdapter;
use crate::types::{DocumentId, SnapshotId, Timestamp};

/// Snapshots of one document, oldest first.
pub struct VersionHistory {
    document_id: DocumentId,
    key: String,
    max_versions: usize,
    storage: Arc<StorageAdapter>,
    events: Arc<StatusBroadcaster>,

    entries: Vec<VersionSnapshot>,
    current: Option<SnapshotId>,
}

impl VersionHistory {
    /// Open the history for a document, loading any stored snapshots.
    ///
    /// A stored list that cannot be decoded is dropped and the history starts
    /// empty. Unavailable storage also yields an empty history.
    pub fn open(
        storage: Arc<StorageAdapter>,
        document_id: DocumentId,
        config: &HistoryConfig,
        events: Arc<StatusBroadcaster>,
    ) -> Self {
        let key = versions_key(&document_id);
        let max_versions = config.max_versions.max(1);

        let mut entries = match storage.get_json::<Vec<VersionSnapshot>>(&key) {
            Ok(Some(entries)) => entries,
            Ok(None) | Err(DraftError::StorageUnavailable) => Vec::new(),
            Err(e) => {
                warn!(key = %key, error = %e, "discarding stored version history");
                if let Err(e) = storage.remove(&key) {
                    warn!(key = %key, error = %e, "failed to remove version history");
                }
                Vec::new()
            }
        };
        if entries.len() > max_versions {
            entries.drain(..entries.len() - max_versions);
        }
        debug!(document = %document_id, versions = entries.len(), "version history opened");

        Self {
            document_id,
            key,
            max_versions,
            storage,
            events,
            entries,
            current: None,
        }
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot id last saved or loaded.
    pub fn current_version(&self) -> Option<&SnapshotId> {
        self.current.as_ref()
    }

    pub fn metadata(&self) -> VersionMetadata {
        VersionMetadata {
            current_version: self.current.clone(),
            total_versions: self.entries.len(),
            last_modified: self.entries.last().map(|s| s.timestamp),
        }
    }

    // --- Recording ---

    /// Record a copy of `document`.
    ///
    /// The snapshot is kept in memory even if the durable write fails; in
    /// that case the error is `NotPersisted` and carries the new id.
    pub fn save_version(
        &mut self,
        document: &Document,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<SnapshotId> {
        self.record(VersionSnapshot::capture(document, label, description, false))
    }

    /// Record an automatic backup labeled with the current local time.
    pub fn create_backup(&mut self, document: &Document) -> Result<SnapshotId> {
        let label = format!("Backup {}", Timestamp::now().to_local_string());
        self.record(VersionSnapshot::capture(
            document,
            label,
            BACKUP_DESCRIPTION,
            true,
        ))
    }

    fn record(&mut self, snapshot: VersionSnapshot) -> Result<SnapshotId> {
        let id = snapshot.id.clone();
        let label = snapshot.label.clone();
        let automatic = snapshot.is_automatic;

        self.entries.push(snapshot);
        if self.entries.len() > self.max_versions {
            let excess = self.entries.len() - self.max_versions;
            let evicted = self.entries.drain(..excess).count();
            debug!(evicted, "oldest versions evicted");
        }
        self.current = Some(id.clone());

        self.events.broadcast(StatusEvent::VersionSaved {
            document: self.document_id.clone(),
            snapshot: id.clone(),
            label: label.clone(),
            automatic,
        });

        match self.persist() {
            Ok(()) => {
                info!(document = %self.document_id, snapshot = %id, label = %label, "version saved");
                Ok(id)
            }
            Err(e) => {
                warn!(document = %self.document_id, snapshot = %id, error = %e, "version kept in memory only");
                Err(DraftError::NotPersisted {
                    snapshot: id,
                    source: Box::new(e),
                })
            }
        }
    }

    fn persist(&self) -> Result<()> {
        self.storage.set_json(&self.key, &self.entries)
    }

    // --- Reading ---

    pub fn get(&self, id: &SnapshotId) -> Option<&VersionSnapshot> {
        self.entries.iter().find(|s| &s.id == id)
    }

    /// Copy of the document held by a snapshot. Marks it as current.
    pub fn load_version(&mut self, id: &SnapshotId) -> Option<Document> {
        let document = self.get(id)?.document.clone();
        self.current = Some(id.clone());
        Some(document)
    }

    /// Snapshots, newest first.
    pub fn list_versions(&self) -> Vec<&VersionSnapshot> {
        self.entries.iter().rev().collect()
    }

    /// Copy of the newest automatic backup.
    pub fn restore_latest_backup(&mut self) -> Option<Document> {
        let id = self
            .entries
            .iter()
            .rev()
            .find(|s| s.is_automatic)?
            .id
            .clone();
        self.load_version(&id)
    }

    /// Copy of the newest snapshot of any kind.
    pub fn restore_latest(&mut self) -> Option<Document> {
        let id = self.entries.last()?.id.clone();
        self.load_version(&id)
    }

    // --- Removal ---

    /// Remove one snapshot. Returns `false` if it did not exist.
    pub fn delete_version(&mut self, id: &SnapshotId) -> Result<bool> {
        let Some(index) = self.entries.iter().position(|s| &s.id == id) else {
            return Ok(false);
        };
        self.entries.remove(index);
        if self.current.as_ref() == Some(id) {
            self.current = None;
        }
        debug!(document = %self.document_id, snapshot = %id, "version deleted");
        self.persist()?;
        Ok(true)
    }

    /// Remove every snapshot, in memory and in storage.
    pub fn clear_history(&mut self) -> Result<()> {
        self.entries.clear();
        self.current = None;
        self.events.broadcast(StatusEvent::HistoryCleared {
            document: self.document_id.clone(),
        });
        info!(document = %self.document_id, "version history cleared");
        self.storage.remove(&self.key)
    }
}
