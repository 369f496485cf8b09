//! Status values shown to the editor UI.

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DraftError, ErrorKind};
use crate::types::{DocumentId, SnapshotId, Timestamp};

/// Unique identifier for a status subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Persistence state of the current draft.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SaveStatus {
    /// Nothing to save.
    Idle,

    /// A save is scheduled.
    Pending,

    /// Scheduling is suspended.
    Paused,

    Saved {
        at: Timestamp,
        bytes: usize,
    },

    /// A save failed; the next mutation retries.
    Failed {
        kind: ErrorKind,
        message: String,
    },

    /// Storage is full; cleanup ran and removed `reclaimed` keys.
    StorageFull {
        reclaimed: usize,
    },

    /// Storage is unavailable; work will not survive a reload.
    MemoryOnly,

    /// The stored draft was rejected. The user must start fresh or restore
    /// a version.
    CorruptRecord {
        reason: String,
    },
}

impl SaveStatus {
    /// Status for a failed storage call.
    pub fn from_error(error: &DraftError) -> Self {
        match error {
            DraftError::CorruptRecord { reason, .. } => SaveStatus::CorruptRecord {
                reason: reason.clone(),
            },
            e => match e.kind() {
                ErrorKind::StorageUnavailable => SaveStatus::MemoryOnly,
                kind => SaveStatus::Failed {
                    kind,
                    message: e.to_string(),
                },
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SaveStatus::Failed { .. }
                | SaveStatus::StorageFull { .. }
                | SaveStatus::MemoryOnly
                | SaveStatus::CorruptRecord { .. }
        )
    }

    /// Short text for a non-modal status indicator.
    pub fn label(&self) -> &'static str {
        match self {
            SaveStatus::Idle => "",
            SaveStatus::Pending => "Unsaved changes",
            SaveStatus::Paused => "Autosave paused",
            SaveStatus::Saved { .. } => "Saved",
            SaveStatus::Failed { .. } => "Save failed",
            SaveStatus::StorageFull { .. } => "Storage full",
            SaveStatus::MemoryOnly => "Not saved: storage unavailable",
            SaveStatus::CorruptRecord { .. } => "Saved draft could not be read",
        }
    }
}

/// Events delivered to status subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// The persistence status of a document changed.
    Status {
        document: DocumentId,
        status: SaveStatus,
    },

    /// A version snapshot was recorded.
    VersionSaved {
        document: DocumentId,
        snapshot: SnapshotId,
        label: String,
        automatic: bool,
    },

    /// The version history was cleared.
    HistoryCleared { document: DocumentId },

    /// The subscription was dropped because its buffer filled up.
    Dropped,
}

/// Handle for receiving status events.
pub struct StatusSubscription {
    pub id: SubscriptionId,
    pub(crate) receiver: Receiver<StatusEvent>,
}

impl StatusSubscription {
    /// Block until the next event.
    pub fn recv(&self) -> Result<StatusEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<StatusEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<StatusEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered.
    pub fn drain(&self) -> Vec<StatusEvent> {
        self.receiver.try_iter().collect()
    }
}
