//! Storage engine contract.
//!
//! The database core only talks to this trait. Backends own atomicity of
//! `apply_transaction`; everything else is plain per-store CRUD.

use serde_json::Value;

use crate::batch::Transaction;
use crate::entry::Entry;
use crate::error::StorageError;
use crate::path::{EntityPath, NodePath};

/// Contract every storage backend implements.
///
/// # Transaction semantics
/// - `Put` replaces the whole leaf at its path and drops any leaf below it.
/// - `Delete` on a leaf or an inner node removes it with every leaf below;
///   on a path inside a leaf it removes the addressed element. Deleting
///   something that does not exist is a no-op.
/// - `Update` on a leaf shallow-merges objects and replaces anything else;
///   inside a leaf it sets the addressed element. With no containing leaf a
///   key-only path creates the leaf.
///
/// A failing operation aborts the whole transaction with the store unchanged.
pub trait StorageEngine: Send + Sync {
    /// Applies `transaction` atomically.
    ///
    /// Returns the leaf or subtree paths that changed, in first-change order.
    fn apply_transaction(&self, transaction: &Transaction) -> Result<Vec<NodePath>, StorageError>;

    /// Value at `path`: a leaf, an element inside a leaf, or the object
    /// assembled from every leaf below `path`.
    fn get(&self, path: &EntityPath) -> Result<Option<Value>, StorageError>;

    /// The stored entry of the leaf at `path`.
    fn get_entry(&self, path: &NodePath) -> Result<Option<Entry<Value>>, StorageError>;

    /// True if a leaf exists at `path`.
    fn has(&self, path: &NodePath) -> Result<bool, StorageError>;

    /// Every entry at or below `prefix` (all entries for `None`), in key order.
    fn get_all(&self, prefix: Option<&NodePath>) -> Result<Vec<Entry<Value>>, StorageError>;

    /// Every leaf path at or below `prefix`, in key order.
    fn get_all_keys(&self, prefix: Option<&NodePath>) -> Result<Vec<NodePath>, StorageError>;

    /// Number of leaves at or below `prefix`.
    fn count(&self, prefix: Option<&NodePath>) -> Result<usize, StorageError>;

    /// Visits entries in key order until `visit` returns false.
    ///
    /// Returns the number of entries visited.
    fn scan(
        &self,
        prefix: Option<&NodePath>,
        visit: &mut dyn FnMut(&Entry<Value>) -> bool,
    ) -> Result<usize, StorageError>;

    /// Stores raw entries as-is, keyed by their `key` path.
    fn set_batch(&self, entries: Vec<Entry<Value>>) -> Result<(), StorageError>;

    /// Removes every entry.
    fn clear(&self) -> Result<(), StorageError>;
}
