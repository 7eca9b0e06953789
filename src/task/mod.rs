//! Async sequencing primitives used by the dispatch layer.

/// One-shot eventual results and resolvable promises.
pub mod eventual;
/// FIFO task queue with a dedicated worker thread.
pub mod queue;

pub use eventual::{Eventual, IntoEventual, OpenPromise, Resolver};
pub use queue::{TaskQueue, TaskQueueConfig};
