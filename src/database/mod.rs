//! Path-addressed database handles.
//!
//! [`Database`] applies transactions to a [`StorageEngine`] and notifies
//! subscribers. [`RemoteDatabase`] offers the same builders over any
//! [`Dispatcher`](crate::dispatch::Dispatcher), so batch code does not
//! care where the database lives.

mod handlers;
mod remote;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::batch::{Batch, CommitTarget, Transaction, TransactionBuilder, TransactionOperation};
use crate::error::{PathDbResult, StateError};
use crate::path::{IntoEntityPath, IntoNodePath, NodePath};
use crate::storage::{MemoryStorage, StorageEngine};
use crate::subscription::{Subscription, SubscriptionRegistry};
use crate::task::Eventual;

pub use remote::RemoteDatabase;

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Name reported in errors and used as the dispatch target.
    pub name: String,
    /// Events buffered per subscription before new ones are dropped.
    pub subscription_capacity: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            subscription_capacity: 1024,
        }
    }
}

impl DatabaseConfig {
    /// Default configuration with `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

struct DatabaseShared {
    name: String,
    storage: Arc<dyn StorageEngine>,
    subscriptions: Arc<SubscriptionRegistry>,
    closed: AtomicBool,
    commit_lock: Mutex<()>,
}

impl DatabaseShared {
    fn ensure_open(&self) -> Result<(), StateError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StateError::DatabaseClosed {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    fn apply(&self, transaction: &Transaction) -> PathDbResult<()> {
        // Serializes commits so notifications follow commit order.
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_open()?;

        let changed = self.storage.apply_transaction(transaction)?;
        let delivered = self.subscriptions.notify(&changed, |path| {
            match self.storage.get(&path.to_entity_path()) {
                Ok(value) => value.unwrap_or(Value::Null),
                Err(err) => {
                    warn!(
                        database = %self.name,
                        path = %path,
                        error = %err,
                        "notification read failed"
                    );
                    Value::Null
                }
            }
        });
        let kinds: Vec<&str> =
            transaction.operations().iter().map(TransactionOperation::kind).collect();
        debug!(
            database = %self.name,
            operations = ?kinds,
            changed = changed.len(),
            delivered,
            "transaction applied"
        );
        Ok(())
    }
}

impl CommitTarget for DatabaseShared {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn commit(&self, transaction: Transaction) -> Eventual<Value> {
        match self.apply(&transaction) {
            Ok(()) => Eventual::ok(Value::Null),
            Err(err) => Eventual::err(err),
        }
    }
}

/// Handle to a local database. Clones share the same database.
#[derive(Clone)]
pub struct Database {
    shared: Arc<DatabaseShared>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.shared.name)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Opens a database over `storage`.
    pub fn open(storage: Arc<dyn StorageEngine>, config: DatabaseConfig) -> Self {
        info!(database = %config.name, "database opened");
        Self {
            shared: Arc::new(DatabaseShared {
                name: config.name,
                storage,
                subscriptions: Arc::new(SubscriptionRegistry::new(config.subscription_capacity)),
                closed: AtomicBool::new(false),
                commit_lock: Mutex::new(()),
            }),
        }
    }

    /// Opens a database over a fresh [`MemoryStorage`].
    pub fn in_memory(config: DatabaseConfig) -> Self {
        Self::open(Arc::new(MemoryStorage::new()), config)
    }

    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    fn target(&self) -> Arc<dyn CommitTarget> {
        self.shared.clone()
    }

    /// Starts a batch.
    #[must_use]
    pub fn batch(&self) -> Batch {
        Batch::new(self.target())
    }

    /// Starts a transaction.
    #[must_use]
    pub fn transaction(&self) -> TransactionBuilder {
        TransactionBuilder::new(self.target())
    }

    /// Applies an already sealed transaction.
    pub fn commit(&self, transaction: Transaction) -> Eventual<Value> {
        self.shared.commit(transaction)
    }

    /// Value at `path`: a leaf, an element inside a leaf, or the object
    /// assembled from the leaves below `path`.
    pub fn get(&self, path: impl IntoEntityPath) -> PathDbResult<Option<Value>> {
        self.shared.ensure_open()?;
        let path = path.into_entity_path()?;
        Ok(self.shared.storage.get(&path)?)
    }

    /// Number of leaves at or below `prefix` (all leaves for `None`).
    pub fn count(&self, prefix: Option<NodePath>) -> PathDbResult<usize> {
        self.shared.ensure_open()?;
        Ok(self.shared.storage.count(prefix.as_ref())?)
    }

    /// Leaf paths at or below `prefix`, in key order.
    pub fn keys(&self, prefix: Option<NodePath>) -> PathDbResult<Vec<NodePath>> {
        self.shared.ensure_open()?;
        Ok(self.shared.storage.get_all_keys(prefix.as_ref())?)
    }

    /// Streams changes at, above or below `path`.
    pub fn subscribe(&self, path: impl IntoNodePath) -> PathDbResult<Subscription> {
        self.shared.ensure_open()?;
        let path = path.into_node_path()?;
        Ok(self.shared.subscriptions.subscribe(path))
    }

    /// Events dropped because a subscriber fell behind.
    #[must_use]
    pub fn dropped_notifications(&self) -> u64 {
        self.shared.subscriptions.dropped_events()
    }

    /// The storage engine behind this database.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageEngine> {
        &self.shared.storage
    }

    /// Closes the handle. Idempotent.
    ///
    /// Builders and reads fail afterwards; subscription streams disconnect.
    pub fn close(&self) {
        let _guard = self.shared.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.subscriptions.close();
        info!(database = %self.shared.name, "database closed");
    }

    /// True once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Closes the handle and removes every stored entry.
    pub fn destroy(&self) -> PathDbResult<()> {
        self.close();
        self.shared.storage.clear()?;
        info!(database = %self.shared.name, "database destroyed");
        Ok(())
    }
}
