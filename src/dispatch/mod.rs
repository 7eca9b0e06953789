//! Transport-agnostic dispatch.
//!
//! Every dispatcher exposes the same `exec(target, operation, args)` call,
//! so code written against [`Dispatcher`] runs the same whether the work
//! happens in-process ([`MethodDispatcher`], [`SerializingMethodDispatcher`],
//! [`TargetRouter`]) or behind a thread/process boundary
//! ([`TokenizedDispatcher`]).

/// Argument decoding helpers for handlers.
pub mod args;
/// Handler tables and direct method dispatch.
pub mod method;
/// Per-target serializing dispatchers.
pub mod router;
/// FIFO dispatch through a task queue.
pub mod serializing;
/// Token-correlated dispatch across a transport.
pub mod tokenized;
/// Wire messages and their text envelope.
pub mod wire;

use std::sync::Arc;

use serde_json::Value;

use crate::task::Eventual;

pub use method::{Handler, HandlerTable, MethodDispatcher};
pub use router::{DispatcherFactory, TargetRouter};
pub use serializing::SerializingMethodDispatcher;
pub use tokenized::{TokenizedDispatcher, TransportFn, TOKEN_PREFIX};
pub use wire::{Envelope, Request, Response, WireMessage};

/// Uniform execution contract for local and cross-boundary calls.
pub trait Dispatcher: Send + Sync {
    /// Runs `operation` on `target` with `args`.
    fn exec(&self, target: &str, operation: &str, args: Vec<Value>) -> Eventual<Value>;
}

impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    fn exec(&self, target: &str, operation: &str, args: Vec<Value>) -> Eventual<Value> {
        (**self).exec(target, operation, args)
    }
}
