//! The serialized draft written to storage.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::Document;
use crate::error::{DraftError, Result};
use crate::storage::keys::document_key;
use crate::storage::StorageAdapter;
use crate::types::{DocumentId, Timestamp};

/// Current persistence record schema.
pub const SCHEMA_VERSION: u32 = 1;

/// A document plus its schema tag, as stored under `document:<id>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceRecord {
    pub schema_version: u32,

    #[serde(default)]
    pub saved_at: Timestamp,

    pub document: Document,
}

/// Borrowing twin of `PersistenceRecord` so saves do not clone the document.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordRef<'a> {
    schema_version: u32,
    saved_at: Timestamp,
    document: &'a Document,
}

impl PersistenceRecord {
    pub fn new(document: Document) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            saved_at: Timestamp::now(),
            document,
        }
    }

    /// Serialize a document as a record without taking ownership of it.
    pub fn encode(document: &Document) -> Result<String> {
        let record = RecordRef {
            schema_version: SCHEMA_VERSION,
            saved_at: Timestamp::now(),
            document,
        };
        Ok(serde_json::to_string(&record)?)
    }

    /// Parse and validate a stored record.
    ///
    /// The record is accepted whole or rejected with `CorruptRecord`; nothing
    /// is partially applied.
    pub fn decode(key: &str, raw: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| DraftError::corrupt(key, e.to_string()))?;

        let obj = value
            .as_object()
            .ok_or_else(|| DraftError::corrupt(key, "record is not an object"))?;

        let version = obj
            .get("schemaVersion")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| DraftError::corrupt(key, "missing schemaVersion"))?;
        if version == 0 || version > SCHEMA_VERSION as u64 {
            return Err(DraftError::corrupt(
                key,
                format!("unsupported schemaVersion {}", version),
            ));
        }

        if !obj.get("document").is_some_and(|d| d.is_object()) {
            return Err(DraftError::corrupt(key, "missing document"));
        }

        let record: PersistenceRecord =
            serde_json::from_value(value).map_err(|e| DraftError::corrupt(key, e.to_string()))?;
        record
            .document
            .validate()
            .map_err(|reason| DraftError::corrupt(key, reason))?;

        Ok(record)
    }
}

/// Write the document's record. Returns the number of bytes written.
pub fn store_document(storage: &StorageAdapter, document: &Document) -> Result<usize> {
    let raw = PersistenceRecord::encode(document)?;
    storage.set(&document_key(&document.id), &raw)?;
    Ok(raw.len())
}

/// Read the document's record, if one exists.
pub fn load_document(storage: &StorageAdapter, id: &DocumentId) -> Result<Option<Document>> {
    let key = document_key(id);
    let Some(raw) = storage.get(&key)? else {
        return Ok(None);
    };

    let record = PersistenceRecord::decode(&key, &raw).inspect_err(|e| {
        warn!(key = %key, error = %e, "discarding stored draft");
    })?;

    if &record.document.id != id {
        return Err(DraftError::corrupt(
            key,
            format!("record holds document {}", record.document.id),
        ));
    }
    Ok(Some(record.document))
}
