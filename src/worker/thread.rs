//! OS-thread worker connected by text pipes.
//!
//! The client side owns a [`TokenizedDispatcher`]. Requests travel to the
//! worker thread as JSON envelopes; a listener thread reads response
//! envelopes and announces them. When the worker side goes away, or the
//! worker is terminated, every pending call is rejected with a transport
//! error. A call the worker never answers stays pending until then.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, Envelope, TokenizedDispatcher};
use crate::error::{PathDbError, PathDbResult, TransportError};
use crate::task::Eventual;

use super::host::WorkerHost;

/// Thread worker configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThreadWorkerConfig {
    /// Name of the worker thread; the listener gets a `-listener` suffix.
    pub thread_name: String,
    /// Capacity of each pipe direction.
    pub channel_capacity: usize,
}

impl Default for ThreadWorkerConfig {
    fn default() -> Self {
        Self {
            thread_name: "pathdb-worker".to_string(),
            channel_capacity: 1024,
        }
    }
}

/// Client handle to a worker running on its own thread.
pub struct ThreadWorker {
    name: String,
    dispatcher: Arc<TokenizedDispatcher>,
    stop_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    terminated: AtomicBool,
}

impl fmt::Debug for ThreadWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadWorker")
            .field("name", &self.name)
            .field("pending", &self.dispatcher.pending_count())
            .field("terminated", &self.is_terminated())
            .finish_non_exhaustive()
    }
}

impl ThreadWorker {
    /// Spawns the worker thread; `make_host` runs on that thread.
    ///
    /// If `make_host` fails the worker exits at once and pending calls are
    /// rejected as disconnected.
    pub fn spawn<F>(config: ThreadWorkerConfig, make_host: F) -> PathDbResult<Self>
    where
        F: FnOnce() -> PathDbResult<WorkerHost> + Send + 'static,
    {
        let capacity = config.channel_capacity.max(1);
        let (request_tx, request_rx) = bounded::<String>(capacity);
        let (response_tx, response_rx) = bounded::<String>(capacity);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let worker_name = config.thread_name.clone();
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                match make_host() {
                    Ok(host) => worker_loop(&host, &request_rx, &response_tx, &stop_rx),
                    Err(err) => {
                        warn!(worker = %worker_name, error = %err, "worker host failed to start");
                    }
                }
                // Close the request side first so no send can succeed after
                // the listener has seen the disconnect.
                drop(request_rx);
                drop(response_tx);
            })
            .map_err(|e| PathDbError::internal(format!("failed to spawn worker thread: {e}")))?;

        let dispatcher = Arc::new(TokenizedDispatcher::new(move |request| {
            let text = Envelope::Request(request).encode()?;
            request_tx
                .send(text)
                .map_err(|_| TransportError::SendFailed {
                    message: "worker request pipe closed".to_string(),
                })?;
            Ok(())
        }));

        let listener_dispatcher = Arc::clone(&dispatcher);
        let listener_name = config.thread_name.clone();
        thread::Builder::new()
            .name(format!("{}-listener", config.thread_name))
            .spawn(move || listen(&listener_dispatcher, &response_rx, &listener_name))
            .map_err(|e| PathDbError::internal(format!("failed to spawn worker listener: {e}")))?;

        info!(worker = %config.thread_name, "thread worker started");
        Ok(Self {
            name: config.thread_name,
            dispatcher,
            stop_tx: Mutex::new(Some(stop_tx)),
            worker: Mutex::new(Some(worker)),
            terminated: AtomicBool::new(false),
        })
    }

    /// The client-side dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> Arc<TokenizedDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Calls awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.dispatcher.pending_count()
    }

    /// Stops the worker and rejects every pending call as aborted. Idempotent.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        let aborted = self.dispatcher.abort_all_pending_operations(TransportError::Aborted {
            reason: format!("worker '{}' terminated", self.name),
        });

        drop(self.stop_tx.lock().unwrap_or_else(PoisonError::into_inner).take());
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        info!(worker = %self.name, aborted, "thread worker terminated");
    }

    /// True once [`Self::terminate`] was called.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

impl Dispatcher for ThreadWorker {
    fn exec(&self, target: &str, operation: &str, args: Vec<Value>) -> Eventual<Value> {
        if self.is_terminated() {
            return Eventual::err(TransportError::Disconnected { path: self.name.clone() });
        }
        self.dispatcher.exec(target, operation, args)
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn worker_loop(
    host: &WorkerHost,
    requests: &Receiver<String>,
    responses: &Sender<String>,
    stop: &Receiver<()>,
) {
    loop {
        select! {
            recv(requests) -> msg => match msg {
                Ok(text) => handle_text(host, &text, responses),
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
    debug!("worker loop exiting");
}

fn handle_text(host: &WorkerHost, text: &str, responses: &Sender<String>) {
    let request = match Envelope::decode(text) {
        Ok(Envelope::Request(request)) => request,
        Ok(Envelope::Response(response)) => {
            debug!(token = %response.token, "worker ignoring response envelope");
            return;
        }
        Err(err) => {
            warn!(error = %err, "worker dropping undecodable message");
            return;
        }
    };

    let responses = responses.clone();
    host.handle(request, move |response| {
        let token = response.token.clone();
        match Envelope::Response(response).encode() {
            Ok(text) => {
                if responses.send(text).is_err() {
                    debug!(token = %token, "response pipe closed");
                }
            }
            Err(err) => warn!(token = %token, error = %err, "failed to encode response"),
        }
    });
}

fn listen(dispatcher: &TokenizedDispatcher, responses: &Receiver<String>, name: &str) {
    for text in responses {
        match Envelope::decode(&text) {
            Ok(Envelope::Response(response)) if dispatcher.is_own_message(&response) => {
                dispatcher.announce_response(response);
            }
            Ok(other) => debug!(worker = %name, kind = ?other, "ignoring foreign message"),
            Err(err) => {
                warn!(worker = %name, error = %err, "listener dropping undecodable message");
            }
        }
    }
    dispatcher.abort_all_pending_operations(TransportError::Disconnected {
        path: name.to_string(),
    });
}
