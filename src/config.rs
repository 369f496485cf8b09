//! Editor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DraftError, Result};
use crate::storage::keys::DOCUMENT_PREFIX;
use crate::storage::DEFAULT_QUOTA_BYTES;

/// Save timing thresholds, in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersisterConfig {
    /// Quiet period after the last mutation before a save is attempted.
    pub debounce_ms: u64,

    /// Shortest allowed time between two scheduled writes.
    pub min_save_gap_ms: u64,

    /// Longest time a pending change waits regardless of debounce resets.
    pub max_save_interval_ms: u64,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1_000,
            min_save_gap_ms: 5_000,
            max_save_interval_ms: 10_000,
        }
    }
}

impl PersisterConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn min_save_gap(&self) -> Duration {
        Duration::from_millis(self.min_save_gap_ms)
    }

    pub fn max_save_interval(&self) -> Duration {
        Duration::from_millis(self.max_save_interval_ms)
    }

    /// The thresholds must satisfy `debounce < min_save_gap < max_save_interval`.
    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(DraftError::InvalidConfig("debounce_ms must be positive".into()));
        }
        if self.debounce_ms >= self.min_save_gap_ms {
            return Err(DraftError::InvalidConfig(format!(
                "debounce_ms ({}) must be less than min_save_gap_ms ({})",
                self.debounce_ms, self.min_save_gap_ms
            )));
        }
        if self.min_save_gap_ms >= self.max_save_interval_ms {
            return Err(DraftError::InvalidConfig(format!(
                "min_save_gap_ms ({}) must be less than max_save_interval_ms ({})",
                self.min_save_gap_ms, self.max_save_interval_ms
            )));
        }
        Ok(())
    }
}

/// Version history settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Snapshots retained per document; oldest are evicted first.
    pub max_versions: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_versions: 10 }
    }
}

/// Storage settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Byte quota for the built-in backends.
    pub quota_bytes: Option<u64>,

    /// Read cache entries for file storage.
    pub cache_size: usize,

    /// Keys removed per quota cleanup pass.
    pub reclaim_max_evictions: usize,

    /// Keys with these prefixes are never removed by cleanup.
    pub essential_prefixes: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            quota_bytes: Some(DEFAULT_QUOTA_BYTES),
            cache_size: 64,
            reclaim_max_evictions: 3,
            essential_prefixes: vec![DOCUMENT_PREFIX.to_string()],
        }
    }
}

/// Top-level configuration for an editor session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub persister: PersisterConfig,
    pub history: HistoryConfig,
    pub storage: StorageConfig,
}

impl EditorConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: EditorConfig = serde_json::from_str(raw)
            .map_err(|e| DraftError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.persister.validate()?;
        if self.history.max_versions == 0 {
            return Err(DraftError::InvalidConfig("max_versions must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EditorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.persister.debounce(), Duration::from_secs(1));
        assert_eq!(config.history.max_versions, 10);
    }

    #[test]
    fn test_from_json_partial() {
        let config = EditorConfig::from_json(r#"{"persister": {"debounce_ms": 500}}"#).unwrap();
        assert_eq!(config.persister.debounce_ms, 500);
        assert_eq!(config.persister.min_save_gap_ms, 5_000);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let config = PersisterConfig {
            debounce_ms: 1_000,
            min_save_gap_ms: 20_000,
            max_save_interval_ms: 10_000,
        };
        assert!(matches!(config.validate(), Err(DraftError::InvalidConfig(_))));

        let err = EditorConfig::from_json(r#"{"history": {"max_versions": 0}}"#).unwrap_err();
        assert!(matches!(err, DraftError::InvalidConfig(_)));
    }
}
