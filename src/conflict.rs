//! Sync conflict records.
//!
//! Conflicts are explicit objects handed to an external handler. The
//! database never resolves them itself; it only has to carry this shape
//! across the dispatch boundary unchanged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::NodePath;
use crate::task::Eventual;

/// A local entry and a remote entry that disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub key: String,
    pub path: NodePath,
    pub local_value: Value,
    pub remote_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_commit_time: Option<DateTime<Utc>>,
}

impl ConflictInfo {
    /// True if the remote side wrote later than the local side.
    ///
    /// Missing times compare as older.
    #[must_use]
    pub fn remote_is_newer(&self) -> bool {
        self.remote_update_time > self.local_update_time
    }
}

/// Outcome chosen by a conflict handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Keep the local value.
    KeepLocal,
    /// Accept the remote value.
    KeepRemote,
    /// Store a merged value instead of either side.
    Merged { value: Value },
}

/// Callback invoked by a sync engine for every conflict it finds.
pub type ConflictHandler = Arc<dyn Fn(ConflictInfo) -> Eventual<ConflictResolution> + Send + Sync>;
