//! Editor session: one document's draft, persister and history.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::EditorConfig;
use crate::document::{default_funnel, BlockKind, Document, Properties};
use crate::draft::DraftStore;
use crate::error::{DraftError, Result};
use crate::history::{VersionHistory, VersionMetadata, VersionSnapshot};
use crate::persistence::{Clock, DebouncedPersister, SaveOutcome, SystemClock};
use crate::status::{SaveStatus, StatusBroadcaster, StatusSubscription, SubscriptionId};
use crate::storage::StorageAdapter;
use crate::types::{BlockId, DocumentId, PageId, SnapshotId};

/// Why the session opened on a placeholder document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recovery {
    /// Why the stored draft was rejected.
    pub reason: String,
    /// A version snapshot is available to restore from.
    pub has_versions: bool,
}

/// The composition root for editing one document.
///
/// Every mutation that changes the draft schedules a save; the host drives
/// the timers by calling `tick` (directly or through `AutosaveDriver`).
/// Dropping the session cancels any pending save.
pub struct EditorSession {
    document_id: DocumentId,
    events: Arc<StatusBroadcaster>,
    storage: Arc<StorageAdapter>,
    draft: DraftStore,
    persister: DebouncedPersister,
    history: VersionHistory,
    recovery: Option<Recovery>,
}

impl EditorSession {
    /// Open a session on the system clock.
    pub fn open(
        config: EditorConfig,
        storage: Arc<StorageAdapter>,
        document_id: DocumentId,
    ) -> Result<Self> {
        Self::open_with_clock(config, storage, document_id, Arc::new(SystemClock::new()))
    }

    /// Open a session, loading the stored draft if there is a valid one.
    ///
    /// A missing draft starts from the default funnel. A corrupt draft is
    /// discarded: the session starts from the default funnel and `recovery`
    /// reports the problem until `start_fresh` or `restore_latest_version`.
    pub fn open_with_clock(
        config: EditorConfig,
        storage: Arc<StorageAdapter>,
        document_id: DocumentId,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let events = Arc::new(StatusBroadcaster::new());

        let mut persister = DebouncedPersister::new(
            document_id.clone(),
            config.persister.clone(),
            clock,
            storage.clone(),
            events.clone(),
        )?;
        let history = VersionHistory::open(
            storage.clone(),
            document_id.clone(),
            &config.history,
            events.clone(),
        );

        let mut recovery = None;
        let document = match persister.load() {
            Ok(Some(document)) => {
                info!(document = %document_id, "draft restored from storage");
                document
            }
            Ok(None) => default_funnel(document_id.clone()),
            Err(DraftError::CorruptRecord { reason, .. }) => {
                recovery = Some(Recovery {
                    reason,
                    has_versions: !history.is_empty(),
                });
                default_funnel(document_id.clone())
            }
            Err(e) => {
                warn!(document = %document_id, error = %e, "draft not loaded");
                default_funnel(document_id.clone())
            }
        };

        Ok(Self {
            document_id,
            events,
            storage,
            draft: DraftStore::new(document),
            persister,
            history,
            recovery,
        })
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// The current document value.
    pub fn document(&self) -> Arc<Document> {
        self.draft.document()
    }

    pub fn revision(&self) -> u64 {
        self.draft.revision()
    }

    pub fn storage(&self) -> &Arc<StorageAdapter> {
        &self.storage
    }

    // --- Editing ---

    fn changed(&mut self, changed: bool) -> bool {
        if changed {
            self.persister.schedule_save();
        }
        changed
    }

    pub fn add_block(&mut self, page_id: &PageId, kind: BlockKind) -> Option<BlockId> {
        let id = self.draft.add_block(page_id, kind);
        self.changed(id.is_some());
        id
    }

    pub fn update_block(&mut self, block_id: &BlockId, partial: &Properties) -> bool {
        let changed = self.draft.update_block(block_id, partial);
        self.changed(changed)
    }

    pub fn delete_block(&mut self, block_id: &BlockId) -> bool {
        let changed = self.draft.delete_block(block_id);
        self.changed(changed)
    }

    pub fn reorder_blocks(&mut self, page_id: &PageId, from: usize, to: usize) -> bool {
        let changed = self.draft.reorder_blocks(page_id, from, to);
        self.changed(changed)
    }

    pub fn duplicate_block(&mut self, block_id: &BlockId) -> Option<BlockId> {
        let id = self.draft.duplicate_block(block_id);
        self.changed(id.is_some());
        id
    }

    pub fn add_page(&mut self, name: &str, kind: &str) -> PageId {
        let id = self.draft.add_page(name, kind);
        self.changed(true);
        id
    }

    pub fn delete_page(&mut self, page_id: &PageId) -> bool {
        let changed = self.draft.delete_page(page_id);
        self.changed(changed)
    }

    pub fn reorder_pages(&mut self, from: usize, to: usize) -> bool {
        let changed = self.draft.reorder_pages(from, to);
        self.changed(changed)
    }

    // --- Saving ---

    /// Record a mutation made outside the session's own edit methods.
    pub fn schedule_save(&mut self) {
        self.persister.schedule_save();
    }

    /// Fire due save timers.
    pub fn tick(&mut self) -> Option<SaveOutcome> {
        let document = self.draft.document();
        self.persister.tick(&document)
    }

    /// When `tick` next has work to do, on the session clock.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.persister.next_deadline()
    }

    pub fn save_now(&mut self) -> SaveOutcome {
        let document = self.draft.document();
        self.persister.save_now(&document)
    }

    /// Save immediately if anything is unsaved (before navigating away).
    pub fn flush(&mut self) -> Option<SaveOutcome> {
        if self.persister.has_unsaved_changes() {
            Some(self.save_now())
        } else {
            self.persister.cancel();
            None
        }
    }

    pub fn pause(&mut self) {
        self.persister.pause();
    }

    pub fn resume(&mut self) {
        self.persister.resume();
    }

    pub fn status(&self) -> &SaveStatus {
        self.persister.status()
    }

    pub fn persister(&self) -> &DebouncedPersister {
        &self.persister
    }

    pub fn subscribe_status(&self) -> StatusSubscription {
        self.events.subscribe()
    }

    pub fn unsubscribe_status(&self, id: SubscriptionId) {
        self.events.unsubscribe(id);
    }

    // --- Versions ---

    /// Snapshot the current document.
    pub fn save_version(
        &mut self,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<SnapshotId> {
        let document = self.draft.document();
        self.history.save_version(&document, label, description)
    }

    pub fn create_backup(&mut self) -> Result<SnapshotId> {
        let document = self.draft.document();
        self.history.create_backup(&document)
    }

    /// Snapshots, newest first.
    pub fn list_versions(&self) -> Vec<&VersionSnapshot> {
        self.history.list_versions()
    }

    /// Copy of a snapshot's document. The draft is not changed.
    pub fn load_version(&mut self, id: &SnapshotId) -> Option<Document> {
        self.history.load_version(id)
    }

    /// Replace the draft with a snapshot's document and schedule a save.
    pub fn restore_version(&mut self, id: &SnapshotId) -> bool {
        match self.history.load_version(id) {
            Some(document) => {
                self.adopt(document);
                self.persister.schedule_save();
                true
            }
            None => false,
        }
    }

    pub fn restore_latest_backup(&mut self) -> bool {
        match self.history.restore_latest_backup() {
            Some(document) => {
                self.adopt(document);
                self.persister.schedule_save();
                true
            }
            None => false,
        }
    }

    pub fn delete_version(&mut self, id: &SnapshotId) -> Result<bool> {
        self.history.delete_version(id)
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.history.clear_history()
    }

    pub fn version_metadata(&self) -> VersionMetadata {
        self.history.metadata()
    }

    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    // --- Recovery ---

    /// Set when the stored draft was rejected at open.
    pub fn recovery(&self) -> Option<&Recovery> {
        self.recovery.as_ref()
    }

    /// Discard the rejected draft and start from the default funnel.
    pub fn start_fresh(&mut self) -> SaveOutcome {
        self.recovery = None;
        self.adopt(default_funnel(self.document_id.clone()));
        self.save_now()
    }

    /// Replace the rejected draft with the newest snapshot.
    ///
    /// Returns `None` and leaves the recovery state in place if there are no
    /// snapshots.
    pub fn restore_latest_version(&mut self) -> Option<SaveOutcome> {
        let document = self.history.restore_latest()?;
        self.recovery = None;
        self.adopt(document);
        Some(self.save_now())
    }

    /// Replace the draft with the stored record, dropping unsaved edits.
    ///
    /// Returns `Ok(false)` if nothing is stored. A corrupt record leaves the
    /// current draft in place, sets `recovery` and returns the error.
    pub fn reload(&mut self) -> Result<bool> {
        match self.persister.load() {
            Ok(Some(document)) => {
                info!(document = %self.document_id, "draft reloaded from storage");
                self.recovery = None;
                self.adopt(document);
                self.persister.discard_pending();
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(DraftError::CorruptRecord { key, reason }) => {
                warn!(document = %self.document_id, %reason, "stored draft rejected, keeping current draft");
                self.recovery = Some(Recovery {
                    reason: reason.clone(),
                    has_versions: !self.history.is_empty(),
                });
                Err(DraftError::CorruptRecord { key, reason })
            }
            Err(e) => Err(e),
        }
    }

    /// Install a document under this session's id.
    fn adopt(&mut self, mut document: Document) {
        document.id = self.document_id.clone();
        self.draft.replace(document);
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.persister.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::ManualClock;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    fn open(storage: Arc<StorageAdapter>) -> (Arc<ManualClock>, EditorSession) {
        let clock = Arc::new(ManualClock::new());
        let session = EditorSession::open_with_clock(
            EditorConfig::default(),
            storage,
            DocumentId::from("funnel"),
            clock.clone(),
        )
        .unwrap();
        (clock, session)
    }

    fn props(value: serde_json::Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_fresh_session_uses_default_funnel() {
        let (_, session) = open(Arc::new(StorageAdapter::new(MemoryStorage::new())));
        assert!(session.recovery().is_none());
        assert_eq!(session.document().pages.len(), 4);
        assert_eq!(session.status(), &SaveStatus::Idle);
    }

    #[test]
    fn test_edits_schedule_and_reopen_restores() {
        let storage = Arc::new(StorageAdapter::new(MemoryStorage::new()));
        let (clock, mut session) = open(storage.clone());
        let page = session.document().pages[0].id.clone();

        let block = session.add_block(&page, BlockKind::Text).unwrap();
        session.update_block(&block, &props(json!({ "content": "persisted" })));
        assert!(session.next_deadline().is_some());

        clock.advance_ms(1_000);
        assert!(session.tick().unwrap().is_saved());
        drop(session);

        let (_, reopened) = open(storage);
        let doc = reopened.document();
        assert_eq!(doc.block(&block).unwrap().content(), Some("persisted"));
    }

    #[test]
    fn test_failed_edit_does_not_schedule() {
        let (_, mut session) = open(Arc::new(StorageAdapter::new(MemoryStorage::new())));
        assert!(session.add_block(&PageId::from("missing"), BlockKind::Text).is_none());
        assert!(!session.delete_block(&BlockId::from("missing")));
        assert_eq!(session.next_deadline(), None);
    }

    #[test]
    fn test_corrupt_draft_enters_recovery() {
        let storage = Arc::new(StorageAdapter::new(MemoryStorage::new()));
        storage.set("document:funnel", "{\"schemaVersion\":1,\"docu").unwrap();

        let (_, mut session) = open(storage.clone());
        let recovery = session.recovery().cloned().unwrap();
        assert!(!recovery.has_versions);
        assert!(matches!(session.status(), SaveStatus::CorruptRecord { .. }));

        assert!(session.restore_latest_version().is_none());
        assert!(session.recovery().is_some());

        assert!(session.start_fresh().is_saved());
        assert!(session.recovery().is_none());
        assert!(storage.get("document:funnel").unwrap().unwrap().starts_with('{'));
    }

    #[test]
    fn test_reload_replaces_unsaved_edits() {
        let storage = Arc::new(StorageAdapter::new(MemoryStorage::new()));
        let (_, mut session) = open(storage);
        assert!(!session.reload().unwrap());

        assert!(session.save_now().is_saved());
        let saved_pages = session.document().pages.len();
        session.add_page("Unsaved", "offer");
        assert!(session.next_deadline().is_some());

        assert!(session.reload().unwrap());
        assert_eq!(session.document().pages.len(), saved_pages);
        assert_eq!(session.next_deadline(), None);
        assert!(!session.persister().has_unsaved_changes());
        assert_eq!(session.status(), &SaveStatus::Idle);
    }

    #[test]
    fn test_recover_from_latest_version() {
        let storage = Arc::new(StorageAdapter::new(MemoryStorage::new()));
        {
            let (_, mut session) = open(storage.clone());
            session.add_page("Kept", "question");
            session.save_version("good", "").unwrap();
        }
        storage.set("document:funnel", "[]").unwrap();

        let (_, mut session) = open(storage);
        assert!(session.recovery().unwrap().has_versions);
        assert!(session.restore_latest_version().unwrap().is_saved());
        assert!(session.document().pages.iter().any(|p| p.name == "Kept"));
    }

    #[test]
    fn test_restore_version_replaces_draft() {
        let (_, mut session) = open(Arc::new(StorageAdapter::new(MemoryStorage::new())));
        let v1 = session.save_version("v1", "").unwrap();
        let pages = session.document().pages.len();

        session.add_page("Extra", "offer");
        assert_eq!(session.document().pages.len(), pages + 1);

        assert!(session.restore_version(&v1));
        assert_eq!(session.document().pages.len(), pages);
        assert_eq!(session.history().current_version(), Some(&v1));
        assert!(session.persister().has_pending_save());
    }

    #[test]
    fn test_flush_saves_only_when_dirty() {
        let (_, mut session) = open(Arc::new(StorageAdapter::new(MemoryStorage::new())));
        assert!(session.flush().is_none());
        session.add_page("More", "question");
        assert!(session.flush().unwrap().is_saved());
        assert!(!session.persister().has_pending_save());
    }
}
