//! Batch and transaction builders.
//!
//! Both shapes record validated operations and hand them, sealed, to their
//! owning database. Every mutating call checks, in this order, that the
//! builder was not committed yet and that the database is still open,
//! then validates its arguments, and only then touches the operation log.
//!
//! # Example
//! ```rust,ignore
//! let mut batch = db.batch();
//! batch.put("users/alice", json!({"name": "Alice"}))?.update("users/alice/age", json!(30))?;
//! let key = batch.add_list_item("todos", json!("buy milk"))?;
//! batch.write()?.wait()?;
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{PathDbResult, StateError};
use crate::id;
use crate::path::{IntoEntityPath, IntoNodePath};
use crate::task::Eventual;

use super::operation::{Transaction, TransactionOperation};

/// Database side of a builder: where sealed transactions go.
pub trait CommitTarget: Send + Sync {
    /// Name used in state errors.
    fn name(&self) -> &str;

    /// True once the database handle has been closed.
    fn is_closed(&self) -> bool;

    /// Applies `transaction` atomically. Settles with the engine's
    /// completion value (`null` for local databases).
    fn commit(&self, transaction: Transaction) -> Eventual<Value>;
}

/// Builder flavor committed with [`WriteBuilder::write`].
#[derive(Debug)]
pub enum BatchMode {}

/// Builder flavor committed with [`WriteBuilder::commit`].
#[derive(Debug)]
pub enum TransactionMode {}

/// Chainable batch of writes.
pub type Batch = WriteBuilder<BatchMode>;

/// Transaction with an explicit commit.
pub type TransactionBuilder = WriteBuilder<TransactionMode>;

/// Options for [`WriteBuilder::add_list_item_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListItemOptions {
    /// Return the builder instead of the generated key.
    pub chain: bool,
}

/// What `add_list_item_with` returns.
#[derive(Debug)]
pub enum ListItem<'a, B> {
    /// Key generated for the new item.
    Key(String),
    /// The builder, for further chained calls.
    Chained(&'a mut B),
}

impl<'a, B> ListItem<'a, B> {
    /// The generated key, if not chained.
    #[must_use]
    pub fn key(self) -> Option<String> {
        match self {
            Self::Key(k) => Some(k),
            Self::Chained(_) => None,
        }
    }

    /// The builder, if chained.
    #[must_use]
    pub fn chained(self) -> Option<&'a mut B> {
        match self {
            Self::Key(_) => None,
            Self::Chained(b) => Some(b),
        }
    }
}

/// Shared builder state for [`Batch`] and [`TransactionBuilder`].
pub struct WriteBuilder<K> {
    target: Arc<dyn CommitTarget>,
    operations: Vec<TransactionOperation>,
    committed: bool,
    _mode: PhantomData<K>,
}

impl<K> fmt::Debug for WriteBuilder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBuilder")
            .field("target", &self.target.name())
            .field("operations", &self.operations)
            .field("committed", &self.committed)
            .finish()
    }
}

impl<K> WriteBuilder<K> {
    /// Creates an empty builder owned by `target`.
    #[must_use]
    pub fn new(target: Arc<dyn CommitTarget>) -> Self {
        Self {
            target,
            operations: Vec::new(),
            committed: false,
            _mode: PhantomData,
        }
    }

    fn ensure_writable(&self) -> Result<(), StateError> {
        if self.committed {
            return Err(StateError::AlreadyCommitted);
        }
        if self.target.is_closed() {
            return Err(StateError::DatabaseClosed {
                name: self.target.name().to_string(),
            });
        }
        Ok(())
    }

    /// Creates or replaces the leaf at `path`.
    pub fn put(
        &mut self,
        path: impl IntoNodePath,
        value: impl Into<Value>,
    ) -> PathDbResult<&mut Self> {
        self.ensure_writable()?;
        let path = path.into_node_path()?;
        self.operations.push(TransactionOperation::Put {
            path,
            value: value.into(),
        });
        Ok(self)
    }

    /// Deletes the leaf, subtree or element at `path`.
    pub fn delete(&mut self, path: impl IntoEntityPath) -> PathDbResult<&mut Self> {
        self.ensure_writable()?;
        let path = path.into_entity_path()?;
        self.operations.push(TransactionOperation::Delete { path });
        Ok(self)
    }

    /// Updates the leaf or the element inside a leaf at `path`.
    pub fn update(
        &mut self,
        path: impl IntoEntityPath,
        value: impl Into<Value>,
    ) -> PathDbResult<&mut Self> {
        self.ensure_writable()?;
        let path = path.into_entity_path()?;
        self.operations.push(TransactionOperation::Update {
            path,
            value: value.into(),
        });
        Ok(self)
    }

    /// Adds `value` under a freshly generated key below `list_path`.
    ///
    /// Returns the generated key.
    pub fn add_list_item(
        &mut self,
        list_path: impl IntoNodePath,
        value: impl Into<Value>,
    ) -> PathDbResult<String> {
        let item = self.add_list_item_with(list_path, value, ListItemOptions::default())?;
        Ok(item.key().unwrap_or_default())
    }

    /// Like [`Self::add_list_item`], returning the builder when `options.chain` is set.
    pub fn add_list_item_with(
        &mut self,
        list_path: impl IntoNodePath,
        value: impl Into<Value>,
        options: ListItemOptions,
    ) -> PathDbResult<ListItem<'_, Self>> {
        self.ensure_writable()?;
        let list_path = list_path.into_node_path()?;
        let key = id::list_key();
        let path = list_path.child(key.clone())?;
        self.operations.push(TransactionOperation::Put {
            path,
            value: value.into(),
        });

        if options.chain {
            Ok(ListItem::Chained(self))
        } else {
            Ok(ListItem::Key(key))
        }
    }

    /// Adds a list item and always returns the builder.
    pub fn append_list_item(
        &mut self,
        list_path: impl IntoNodePath,
        value: impl Into<Value>,
    ) -> PathDbResult<&mut Self> {
        self.add_list_item_with(list_path, value, ListItemOptions { chain: true })?;
        Ok(self)
    }

    /// Operations recorded so far.
    #[must_use]
    pub fn operations(&self) -> &[TransactionOperation] {
        &self.operations
    }

    /// True once the builder has been sealed.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        self.committed
    }

    fn seal_and_forward(&mut self) -> PathDbResult<Eventual<Value>> {
        self.ensure_writable()?;
        self.committed = true;
        let transaction = Transaction::new(std::mem::take(&mut self.operations));
        Ok(self.target.commit(transaction))
    }
}

impl WriteBuilder<BatchMode> {
    /// Seals the batch and applies it.
    pub fn write(&mut self) -> PathDbResult<Eventual<Value>> {
        self.seal_and_forward()
    }
}

impl WriteBuilder<TransactionMode> {
    /// Seals the transaction and applies it.
    pub fn commit(&mut self) -> PathDbResult<Eventual<Value>> {
        self.seal_and_forward()
    }
}
