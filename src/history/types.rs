//! Version snapshot types.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::types::{SnapshotId, Timestamp};

/// Description given to automatic backups.
pub const BACKUP_DESCRIPTION: &str = "Automatic backup";

/// A labeled, timestamped copy of a document.
///
/// Once recorded a snapshot is never modified; it can only be deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    pub id: SnapshotId,

    pub label: String,

    #[serde(default)]
    pub description: String,

    pub timestamp: Timestamp,

    /// Created by `create_backup` rather than by the user.
    #[serde(default)]
    pub is_automatic: bool,

    pub document: Document,
}

impl VersionSnapshot {
    pub(crate) fn capture(
        document: &Document,
        label: impl Into<String>,
        description: impl Into<String>,
        is_automatic: bool,
    ) -> Self {
        Self {
            id: SnapshotId::generate(),
            label: label.into(),
            description: description.into(),
            timestamp: Timestamp::now(),
            is_automatic,
            document: document.clone(),
        }
    }
}

/// Summary of a document's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    /// Last snapshot saved or loaded in this session.
    pub current_version: Option<SnapshotId>,
    pub total_versions: usize,
    /// Timestamp of the newest snapshot.
    pub last_modified: Option<Timestamp>,
}
