//! FIFO task queue.
//!
//! Every `TaskQueue` owns one worker thread. Tasks start in the order they
//! were added, and a task starts only after the previous one has fully
//! settled. A failing or panicking task settles its own eventual with the
//! error and the queue moves on.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PathDbError, PathDbResult, TransportError};

use super::eventual::{Eventual, OpenPromise};

/// Task queue configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskQueueConfig {
    /// Name given to the worker thread.
    pub thread_name: String,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            thread_name: "pathdb-queue".to_string(),
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Sequential executor: one task at a time, in submission order.
#[derive(Debug)]
pub struct TaskQueue {
    name: Arc<str>,
    tx: Option<Sender<Job>>,
    pending: Arc<AtomicUsize>,
    worker: Option<JoinHandle<()>>,
}

impl TaskQueue {
    /// Starts a queue with its worker thread.
    pub fn new(config: TaskQueueConfig) -> PathDbResult<Self> {
        let name: Arc<str> = Arc::from(config.thread_name.as_str());
        let pending = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = unbounded::<Job>();

        let worker_pending = Arc::clone(&pending);
        let worker = thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || worker_loop(&rx, &worker_pending))
            .map_err(|e| PathDbError::internal(format!("failed to spawn task queue worker: {e}")))?;

        Ok(Self {
            name,
            tx: Some(tx),
            pending,
            worker: Some(worker),
        })
    }

    /// Schedules `starter` after every previously added task has settled.
    ///
    /// The returned eventual settles with that task's own outcome.
    pub fn add<T, F>(&self, starter: F) -> Eventual<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Eventual<T> + Send + 'static,
    {
        let Some(tx) = &self.tx else {
            return Eventual::err(TransportError::Disconnected {
                path: self.name.to_string(),
            });
        };

        let (resolver, eventual) = OpenPromise::new().split();
        let name = Arc::clone(&self.name);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(starter))
                .map_err(|_| PathDbError::internal("queued task panicked"))
                .and_then(Eventual::wait);
            if let Err(err) = &outcome {
                warn!(queue = %name, error = %err, "queued task failed");
            }
            resolver.settle(outcome);
        });

        self.pending.fetch_add(1, Ordering::AcqRel);
        if tx.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Eventual::err(TransportError::Disconnected {
                path: self.name.to_string(),
            });
        }
        eventual
    }

    /// Tasks queued but not yet started.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Stops accepting tasks, drains the queue and joins the worker.
    pub fn shutdown(mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        // Close the channel; the worker drains queued tasks and exits on its own.
        // Do not join: a task may be waiting on a response that never comes.
        drop(self.tx.take());
        drop(self.worker.take());
    }
}

fn worker_loop(rx: &Receiver<Job>, pending: &AtomicUsize) {
    while let Ok(job) = rx.recv() {
        pending.fetch_sub(1, Ordering::AcqRel);
        job();
    }
    debug!("task queue worker exiting");
}
