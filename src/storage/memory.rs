//! In-memory storage backend.
//!
//! Thread-safe reference implementation of [`StorageEngine`], intended for
//! embedded usage and tests. Leaves are kept in a `BTreeMap` ordered by
//! path, so every subtree is a contiguous key range.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::batch::{Transaction, TransactionOperation};
use crate::entry::{Entry, EntryMetadata};
use crate::error::StorageError;
use crate::path::{EntityPath, NodePath, PathSegment};
use crate::storage::traits::StorageEngine;
use crate::storage::tree;

type Leaves = BTreeMap<NodePath, Entry<Value>>;

fn lock_err() -> StorageError {
    StorageError::PoisonedLock("memory storage")
}

/// Same location with index segments read as decimal keys.
fn key_path(path: &EntityPath) -> NodePath {
    NodePath::from_keys_unchecked(path.segments().iter().map(PathSegment::to_string).collect())
}

fn prefix_of(keys: &[String], len: usize) -> NodePath {
    NodePath::from_keys_unchecked(keys[..len].to_vec())
}

/// Length of the leaf that strictly contains `keys`, if any.
fn containing_leaf(leaves: &Leaves, keys: &[String]) -> Option<usize> {
    (1..keys.len()).find(|&len| leaves.contains_key(&prefix_of(keys, len)))
}

fn below<'a>(
    leaves: &'a Leaves,
    root: &'a NodePath,
) -> impl Iterator<Item = (&'a NodePath, &'a Entry<Value>)> + 'a {
    leaves
        .range(root.clone()..)
        .take_while(move |(path, _)| root.is_prefix_of(path))
}

fn in_scope<'a>(
    leaves: &'a Leaves,
    prefix: Option<&'a NodePath>,
) -> Box<dyn Iterator<Item = (&'a NodePath, &'a Entry<Value>)> + 'a> {
    match prefix {
        Some(root) => Box::new(below(leaves, root)),
        None => Box::new(leaves.iter()),
    }
}

fn touch(entry: &mut Entry<Value>, now: DateTime<Utc>) {
    entry.metadata.update_time = Some(now);
    entry.metadata.commit_time = Some(now);
    entry.metadata.is_head_entry = Some(true);
}

/// Applies one transaction in place, remembering what it overwrote.
///
/// Every leaf is saved to `undo` before its first mutation, so `rollback`
/// restores the store exactly.
struct Staging<'a> {
    leaves: &'a mut Leaves,
    now: DateTime<Utc>,
    changed: Vec<NodePath>,
    undo: BTreeMap<NodePath, Option<Entry<Value>>>,
}

impl<'a> Staging<'a> {
    fn new(leaves: &'a mut Leaves, now: DateTime<Utc>) -> Self {
        Self {
            leaves,
            now,
            changed: Vec::new(),
            undo: BTreeMap::new(),
        }
    }

    fn save(&mut self, path: &NodePath) {
        if !self.undo.contains_key(path) {
            self.undo.insert(path.clone(), self.leaves.get(path).cloned());
        }
    }

    fn rollback(self) {
        let restored = self.undo.len();
        for (path, previous) in self.undo {
            match previous {
                Some(entry) => {
                    self.leaves.insert(path, entry);
                }
                None => {
                    self.leaves.remove(&path);
                }
            }
        }
        debug!(restored, "transaction rolled back");
    }

    /// Removes `root` and every leaf below it. Returns true if anything was removed.
    fn remove_subtree(&mut self, root: &NodePath) -> bool {
        let doomed: Vec<NodePath> =
            below(self.leaves, root).map(|(path, _)| path.clone()).collect();
        for path in &doomed {
            self.save(path);
            self.leaves.remove(path);
        }
        !doomed.is_empty()
    }

    fn mark(&mut self, path: NodePath) {
        if !self.changed.contains(&path) {
            self.changed.push(path);
        }
    }

    fn apply(&mut self, op: &TransactionOperation) -> Result<(), StorageError> {
        match op {
            TransactionOperation::Put { path, value } => self.put(path, value.clone()),
            TransactionOperation::Delete { path } => {
                self.delete(path);
                Ok(())
            }
            TransactionOperation::Update { path, value } => self.update(path, value.clone()),
        }
    }

    fn put(&mut self, path: &NodePath, value: Value) -> Result<(), StorageError> {
        if let Some(len) = containing_leaf(self.leaves, path.segments()) {
            return Err(StorageError::NestedLeaf {
                path: path.to_string(),
                leaf: prefix_of(path.segments(), len).to_string(),
            });
        }

        let previous = self.leaves.get(path).map(|entry| entry.metadata.clone());
        self.remove_subtree(path);
        self.save(path);

        let mut metadata = EntryMetadata::head_at(self.now);
        metadata.sync_reference_time = previous.and_then(|m| m.sync_reference_time);
        self.leaves
            .insert(path.clone(), Entry::new(path.to_string(), value).with_metadata(metadata));
        self.mark(path.clone());
        Ok(())
    }

    fn delete(&mut self, path: &EntityPath) {
        let keys = key_path(path);
        if self.remove_subtree(&keys) {
            self.mark(keys);
            return;
        }

        let Some(len) = containing_leaf(self.leaves, keys.segments()) else {
            return;
        };
        let leaf = prefix_of(keys.segments(), len);
        let now = self.now;
        self.save(&leaf);
        if let Some(entry) = self.leaves.get_mut(&leaf) {
            if tree::remove_in(&mut entry.value, &path.segments()[len..]) {
                touch(entry, now);
                self.mark(leaf);
            }
        }
    }

    fn update(&mut self, path: &EntityPath, value: Value) -> Result<(), StorageError> {
        let keys = key_path(path);
        let now = self.now;

        self.save(&keys);
        if let Some(entry) = self.leaves.get_mut(&keys) {
            tree::merge_update(&mut entry.value, value);
            touch(entry, now);
            self.mark(keys);
            return Ok(());
        }

        if let Some(len) = containing_leaf(self.leaves, keys.segments()) {
            let leaf = prefix_of(keys.segments(), len);
            self.save(&leaf);
            if let Some(entry) = self.leaves.get_mut(&leaf) {
                tree::set_in(&mut entry.value, &path.segments()[len..], value, &path.to_string())?;
                touch(entry, now);
            }
            self.mark(leaf);
            return Ok(());
        }

        if path.has_index() {
            return Err(StorageError::MissingEntry { path: path.to_string() });
        }
        self.put(&keys, value)
    }
}

/// In-memory [`StorageEngine`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    leaves: RwLock<Leaves>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Leaves>, StorageError> {
        self.leaves.read().map_err(|_| lock_err())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Leaves>, StorageError> {
        self.leaves.write().map_err(|_| lock_err())
    }
}

impl StorageEngine for MemoryStorage {
    fn apply_transaction(&self, transaction: &Transaction) -> Result<Vec<NodePath>, StorageError> {
        let mut leaves = self.write()?;
        let mut staging = Staging::new(&mut *leaves, Utc::now());
        for op in transaction.operations() {
            if let Err(err) = staging.apply(op) {
                debug!(
                    operation = op.kind(),
                    path = %op.target(),
                    error = %err,
                    "operation failed"
                );
                staging.rollback();
                return Err(err);
            }
        }
        Ok(staging.changed)
    }

    fn get(&self, path: &EntityPath) -> Result<Option<Value>, StorageError> {
        let leaves = self.read()?;
        let keys = key_path(path);
        if let Some(entry) = leaves.get(&keys) {
            return Ok(Some(entry.value.clone()));
        }
        if let Some(len) = containing_leaf(&leaves, keys.segments()) {
            let leaf = prefix_of(keys.segments(), len);
            return Ok(leaves
                .get(&leaf)
                .and_then(|entry| tree::get_in(&entry.value, &path.segments()[len..]))
                .cloned());
        }

        let mut descendants = below(&leaves, &keys).peekable();
        if descendants.peek().is_none() {
            return Ok(None);
        }
        Ok(Some(tree::assemble(
            &keys,
            descendants.map(|(path, entry)| (path, &entry.value)),
        )))
    }

    fn get_entry(&self, path: &NodePath) -> Result<Option<Entry<Value>>, StorageError> {
        Ok(self.read()?.get(path).cloned())
    }

    fn has(&self, path: &NodePath) -> Result<bool, StorageError> {
        Ok(self.read()?.contains_key(path))
    }

    fn get_all(&self, prefix: Option<&NodePath>) -> Result<Vec<Entry<Value>>, StorageError> {
        let leaves = self.read()?;
        Ok(in_scope(&leaves, prefix).map(|(_, entry)| entry.clone()).collect())
    }

    fn get_all_keys(&self, prefix: Option<&NodePath>) -> Result<Vec<NodePath>, StorageError> {
        let leaves = self.read()?;
        Ok(in_scope(&leaves, prefix).map(|(path, _)| path.clone()).collect())
    }

    fn count(&self, prefix: Option<&NodePath>) -> Result<usize, StorageError> {
        let leaves = self.read()?;
        Ok(in_scope(&leaves, prefix).count())
    }

    fn scan(
        &self,
        prefix: Option<&NodePath>,
        visit: &mut dyn FnMut(&Entry<Value>) -> bool,
    ) -> Result<usize, StorageError> {
        let leaves = self.read()?;
        let mut visited = 0;
        for (_, entry) in in_scope(&leaves, prefix) {
            visited += 1;
            if !visit(entry) {
                break;
            }
        }
        Ok(visited)
    }

    fn set_batch(&self, entries: Vec<Entry<Value>>) -> Result<(), StorageError> {
        let mut parsed = Vec::with_capacity(entries.len());
        for entry in entries {
            match NodePath::parse(&entry.key) {
                Ok(path) => parsed.push((path, entry)),
                Err(_) => return Err(StorageError::InvalidKey { key: entry.key }),
            }
        }

        let mut leaves = self.write()?;
        leaves.extend(parsed);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.write()?.clear();
        Ok(())
    }
}
