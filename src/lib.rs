//! # pathdb - an embeddable, path-addressed database
//!
//! Values live at hierarchical node paths (`"users/alice"`), are written
//! through sealed transactional batches and observed through path
//! subscriptions. The same operations run in-process or behind a
//! thread boundary with identical semantics.
//!
//! ## Core Concepts
//!
//! - **NodePath / EntityPath**: string-only leaf paths, and paths that may
//!   index into a stored value
//! - **Batch / Transaction**: single-use builders of `put`/`delete`/`update`
//!   operations
//! - **NodeLookupTrie**: decides which subscriptions a change reaches
//! - **Dispatcher**: one `exec(target, operation, args)` contract for
//!   direct, serialized and token-correlated execution
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pathdb::{Database, DatabaseConfig};
//! use serde_json::json;
//!
//! let db = Database::in_memory(DatabaseConfig::named("app"));
//! let todos = db.subscribe("todos")?;
//!
//! let mut batch = db.batch();
//! batch.put("users/alice", json!({"name": "Alice"}))?;
//! let key = batch.add_list_item("todos", json!("buy milk"))?;
//! batch.write()?.wait()?;
//!
//! let event = todos.recv()?;
//! assert_eq!(db.get(format!("todos/{key}"))?, Some(json!("buy milk")));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data model
pub mod conflict;
pub mod entry;
pub mod error;
pub mod id;
pub mod path;

// Writes and storage
pub mod batch;
pub mod database;
pub mod storage;
pub mod subscription;

// Execution
pub mod dispatch;
pub mod task;
pub mod worker;

pub use batch::{
    Batch, CommitTarget, ListItem, ListItemOptions, Transaction, TransactionBuilder,
    TransactionOperation,
};
pub use conflict::{ConflictHandler, ConflictInfo, ConflictResolution};
pub use database::{Database, DatabaseConfig, RemoteDatabase};
pub use dispatch::{
    Dispatcher, Envelope, HandlerTable, MethodDispatcher, Request, Response,
    SerializingMethodDispatcher, TargetRouter, TokenizedDispatcher,
};
pub use entry::{Entry, EntryMetadata};
pub use error::{
    DispatchError, ErrorRecord, PathDbError, PathDbResult, StateError, StorageError, TransportError,
    ValidationError,
};
pub use path::{EntityPath, IntoEntityPath, IntoNodePath, NodePath, PathSegment};
pub use storage::{MemoryStorage, StorageEngine};
pub use subscription::{ChangeEvent, LeafMatch, NodeLookupTrie, Subscription, SubscriptionId};
pub use task::{Eventual, OpenPromise, Resolver, TaskQueue, TaskQueueConfig};
pub use worker::{ThreadWorker, ThreadWorkerConfig, WorkerHost};

pub use serde_json::Value;
