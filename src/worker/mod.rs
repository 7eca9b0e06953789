//! Hosting databases behind a thread boundary.

mod host;
mod thread;

pub use host::WorkerHost;
pub use thread::{ThreadWorker, ThreadWorkerConfig};
