//! Debounced draft persistence.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::record::{load_document, store_document};
use crate::config::PersisterConfig;
use crate::document::Document;
use crate::error::{ErrorKind, Result};
use crate::status::{SaveStatus, StatusBroadcaster, StatusEvent};
use crate::storage::StorageAdapter;
use crate::types::{DocumentId, Timestamp};

/// What caused a save attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveTrigger {
    /// The debounce window elapsed after the last mutation.
    Debounce,
    /// The max-interval timer fired.
    MaxInterval,
    /// An explicit `save_now`.
    Manual,
}

/// Result of a save attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { trigger: SaveTrigger, bytes: usize },

    /// A timer fired inside the minimum gap and was dropped.
    Skipped { trigger: SaveTrigger },

    Failed { trigger: SaveTrigger, kind: ErrorKind },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }
}

/// Counters for observing persister behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersisterStats {
    /// Writes attempted against storage.
    pub attempts: u64,
    /// Writes that succeeded.
    pub writes: u64,
    /// Timer firings dropped by the minimum-gap rule.
    pub skipped: u64,
    pub failures: u64,
}

/// Decides when the draft is written to storage.
///
/// Timers are deadlines on the injected clock. The host calls `tick` from its
/// event loop (or uses the session's autosave driver) and `next_deadline`
/// tells it when the next call is useful. Cancelling a timer is clearing its
/// deadline, so nothing can fire after `cancel` or drop.
///
/// The persister never mutates the document; `tick` and `save_now` only read
/// the value they are given.
pub struct DebouncedPersister {
    document_id: DocumentId,
    config: PersisterConfig,
    clock: Arc<dyn Clock>,
    storage: Arc<StorageAdapter>,
    events: Arc<StatusBroadcaster>,

    debounce_deadline: Option<Duration>,
    max_deadline: Option<Duration>,

    /// Clock time of the last successful write.
    last_save: Option<Duration>,
    last_saved_at: Option<Timestamp>,

    paused: bool,
    dirty: bool,
    status: SaveStatus,
    stats: PersisterStats,
}

impl DebouncedPersister {
    pub fn new(
        document_id: DocumentId,
        config: PersisterConfig,
        clock: Arc<dyn Clock>,
        storage: Arc<StorageAdapter>,
        events: Arc<StatusBroadcaster>,
    ) -> Result<Self> {
        config.validate()?;
        let status = if storage.is_available() {
            SaveStatus::Idle
        } else {
            SaveStatus::MemoryOnly
        };

        Ok(Self {
            document_id,
            config,
            clock,
            storage,
            events,
            debounce_deadline: None,
            max_deadline: None,
            last_save: None,
            last_saved_at: None,
            paused: false,
            dirty: false,
            status,
            stats: PersisterStats::default(),
        })
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn stats(&self) -> PersisterStats {
        self.stats
    }

    /// Wall-clock time of the last successful write.
    pub fn last_saved_at(&self) -> Option<Timestamp> {
        self.last_saved_at
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// True if a mutation happened since the last successful write.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    pub fn has_pending_save(&self) -> bool {
        self.debounce_deadline.is_some() || self.max_deadline.is_some()
    }

    /// Earliest armed deadline, on the persister's clock.
    pub fn next_deadline(&self) -> Option<Duration> {
        match (self.debounce_deadline, self.max_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Read the stored draft for this persister's document.
    pub fn load(&mut self) -> Result<Option<Document>> {
        let result = load_document(&self.storage, &self.document_id);
        if let Err(ref e) = result {
            self.set_status(SaveStatus::from_error(e));
        }
        result
    }

    // --- Scheduling ---

    /// Note a mutation. Restarts the debounce window and arms the max-interval
    /// timer if it is not already running. Ignored while paused.
    pub fn schedule_save(&mut self) {
        self.dirty = true;
        if self.paused {
            return;
        }

        let now = self.clock.now();
        self.debounce_deadline = Some(now + self.config.debounce());
        if self.max_deadline.is_none() {
            self.max_deadline = Some(now + self.config.max_save_interval());
        }

        if self.storage.is_available() {
            self.set_status(SaveStatus::Pending);
        }
    }

    /// Fire whatever timers are due, saving `document` if allowed.
    ///
    /// Returns `None` when no timer was due.
    pub fn tick(&mut self, document: &Document) -> Option<SaveOutcome> {
        let now = self.clock.now();
        let debounce_due = self.debounce_deadline.is_some_and(|d| now >= d);
        let max_due = self.max_deadline.is_some_and(|d| now >= d);
        if !debounce_due && !max_due {
            return None;
        }

        if debounce_due {
            self.debounce_deadline = None;
        }
        let trigger = if max_due {
            SaveTrigger::MaxInterval
        } else {
            SaveTrigger::Debounce
        };

        if let Some(earliest) = self.earliest_allowed_save() {
            if now < earliest {
                if max_due {
                    // Keep the staleness bound: fire again as soon as the gap allows.
                    self.max_deadline = Some(earliest);
                }
                self.stats.skipped += 1;
                debug!(?trigger, "save dropped inside minimum gap");
                return Some(SaveOutcome::Skipped { trigger });
            }
        }

        self.debounce_deadline = None;
        self.max_deadline = None;
        Some(self.write(document, trigger))
    }

    /// Cancel pending timers and write immediately, ignoring the minimum gap.
    /// A successful save while paused leaves the status at `Paused`.
    pub fn save_now(&mut self, document: &Document) -> SaveOutcome {
        self.cancel();
        let outcome = self.write(document, SaveTrigger::Manual);
        if self.paused && outcome.is_saved() {
            self.set_status(SaveStatus::Paused);
        }
        outcome
    }

    /// Forget pending timers and unsaved changes after the draft has been
    /// replaced by what is already stored.
    pub(crate) fn discard_pending(&mut self) {
        self.cancel();
        self.dirty = false;
        if self.paused {
            self.set_status(SaveStatus::Paused);
        } else {
            self.set_status(SaveStatus::Idle);
        }
    }

    /// Suspend scheduling and cancel pending timers.
    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.cancel();
        self.set_status(SaveStatus::Paused);
    }

    /// Re-enable scheduling. Changes made while paused are scheduled now.
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if self.dirty {
            self.schedule_save();
        } else if self.storage.is_available() {
            self.set_status(SaveStatus::Idle);
        } else {
            self.set_status(SaveStatus::MemoryOnly);
        }
    }

    /// Drop both timers without saving.
    pub fn cancel(&mut self) {
        self.debounce_deadline = None;
        self.max_deadline = None;
    }

    fn earliest_allowed_save(&self) -> Option<Duration> {
        self.last_save.map(|t| t + self.config.min_save_gap())
    }

    fn write(&mut self, document: &Document, trigger: SaveTrigger) -> SaveOutcome {
        self.stats.attempts += 1;

        match store_document(&self.storage, document) {
            Ok(bytes) => {
                let at = Timestamp::now();
                self.last_save = Some(self.clock.now());
                self.last_saved_at = Some(at);
                self.dirty = false;
                self.stats.writes += 1;
                info!(document = %self.document_id, ?trigger, bytes, "draft saved");
                self.set_status(SaveStatus::Saved { at, bytes });
                SaveOutcome::Saved { trigger, bytes }
            }
            Err(e) if e.is_quota_exceeded() => {
                self.stats.failures += 1;
                let reclaimed = match self.storage.reclaim() {
                    Ok(report) => report.removed.len(),
                    Err(err) => {
                        warn!(error = %err, "storage cleanup failed");
                        0
                    }
                };
                error!(document = %self.document_id, ?trigger, reclaimed, "draft not saved, storage full");
                self.set_status(SaveStatus::StorageFull { reclaimed });
                SaveOutcome::Failed {
                    trigger,
                    kind: ErrorKind::QuotaExceeded,
                }
            }
            Err(e) => {
                self.stats.failures += 1;
                let kind = e.kind();
                warn!(document = %self.document_id, ?trigger, error = %e, "draft not saved");
                self.set_status(SaveStatus::from_error(&e));
                SaveOutcome::Failed { trigger, kind }
            }
        }
    }

    pub(crate) fn set_status(&mut self, status: SaveStatus) {
        if self.status == status {
            return;
        }
        self.status = status.clone();
        self.events.broadcast(StatusEvent::Status {
            document: self.document_id.clone(),
            status,
        });
    }
}
