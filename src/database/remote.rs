use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::batch::{Batch, CommitTarget, Transaction, TransactionBuilder};
use crate::dispatch::Dispatcher;
use crate::error::{PathDbError, PathDbResult, StateError, TransportError};
use crate::path::{IntoEntityPath, NodePath};
use crate::task::Eventual;

struct RemoteShared {
    name: String,
    dispatcher: Arc<dyn Dispatcher>,
    closed: AtomicBool,
}

impl RemoteShared {
    fn exec(&self, operation: &str, args: Vec<Value>) -> Eventual<Value> {
        if self.closed.load(Ordering::Acquire) {
            return Eventual::err(StateError::DatabaseClosed {
                name: self.name.clone(),
            });
        }
        self.dispatcher.exec(&self.name, operation, args)
    }
}

impl CommitTarget for RemoteShared {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn commit(&self, transaction: Transaction) -> Eventual<Value> {
        match encode(&transaction) {
            Ok(encoded) => self.exec("commit", vec![encoded]),
            Err(err) => Eventual::err(err),
        }
    }
}

/// Client handle to a database hosted behind a [`Dispatcher`].
///
/// Builders behave exactly like those of a local
/// [`Database`](super::Database); only the commit travels.
#[derive(Clone)]
pub struct RemoteDatabase {
    shared: Arc<RemoteShared>,
}

impl fmt::Debug for RemoteDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDatabase")
            .field("name", &self.shared.name)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl RemoteDatabase {
    /// Addresses database `name` through `dispatcher`.
    pub fn new(dispatcher: Arc<dyn Dispatcher>, name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(RemoteShared {
                name: name.into(),
                dispatcher,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Database name, used as dispatch target.
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

    /// Value at `path`, `null` when absent.
    ///
    /// The path travels as a segment array so keys and indexes keep their kind.
    pub fn get(&self, path: impl IntoEntityPath) -> Eventual<Value> {
        let encoded = path
            .into_entity_path()
            .map_err(PathDbError::from)
            .and_then(|path| encode(&path));
        match encoded {
            Ok(path) => self.shared.exec("get", vec![path]),
            Err(err) => Eventual::err(err),
        }
    }

    /// Number of leaves at or below `prefix`.
    pub fn count(&self, prefix: Option<&NodePath>) -> Eventual<Value> {
        self.exec_with_prefix("count", prefix)
    }

    /// Leaf path strings at or below `prefix`.
    pub fn keys(&self, prefix: Option<&NodePath>) -> Eventual<Value> {
        self.exec_with_prefix("keys", prefix)
    }

    fn exec_with_prefix(&self, operation: &str, prefix: Option<&NodePath>) -> Eventual<Value> {
        match prefix.map(encode).transpose() {
            Ok(prefix) => self.shared.exec(operation, prefix.into_iter().collect()),
            Err(err) => Eventual::err(err),
        }
    }

    /// Closes the remote database and this handle.
    ///
    /// Calling it again fails with a state error.
    pub fn close(&self) -> Eventual<Value> {
        let eventual = self.shared.exec("close", Vec::new());
        self.shared.closed.store(true, Ordering::Release);
        eventual
    }

    /// True once [`Self::close`] was called on this handle.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

fn encode<T: Serialize>(value: &T) -> PathDbResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| TransportError::Encode { message: e.to_string() }.into())
}
