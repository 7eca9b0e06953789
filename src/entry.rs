//! Persisted entries and their metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamps and flags attached to a stored entry.
///
/// `update_time` is the local write time and `commit_time` the durable one.
/// `sync_reference_time` anchors conflict comparison against the last remote
/// sync checkpoint. `is_head_entry` marks the effective revision among
/// retained ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_reference_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_head_entry: Option<bool>,
}

impl EntryMetadata {
    /// Metadata for a head revision written at `at`.
    #[must_use]
    pub fn head_at(at: DateTime<Utc>) -> Self {
        Self {
            update_time: Some(at),
            commit_time: Some(at),
            sync_reference_time: None,
            is_head_entry: Some(true),
        }
    }

    /// True unless explicitly marked as a non-head revision.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.is_head_entry.unwrap_or(true)
    }
}

/// Unit persisted by a storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<V> {
    pub key: String,
    pub value: V,
    #[serde(default)]
    pub metadata: EntryMetadata,
}

impl<V> Entry<V> {
    /// Creates an entry with default metadata.
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
            metadata: EntryMetadata::default(),
        }
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EntryMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}
