use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::debug;

use crate::error::PathDbResult;
use crate::task::{Eventual, TaskQueueConfig};

use super::method::MethodDispatcher;
use super::serializing::SerializingMethodDispatcher;
use super::Dispatcher;

/// Builds the method dispatcher for a target the first time it is addressed.
pub type DispatcherFactory = Arc<dyn Fn(&str) -> PathDbResult<MethodDispatcher> + Send + Sync>;

/// Routes calls to one [`SerializingMethodDispatcher`] per target.
///
/// Calls for the same target are serialized; different targets proceed
/// independently on their own queues.
pub struct TargetRouter {
    factory: DispatcherFactory,
    thread_name: String,
    targets: Mutex<HashMap<String, Arc<SerializingMethodDispatcher>>>,
}

impl fmt::Debug for TargetRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetRouter")
            .field("thread_name", &self.thread_name)
            .field("targets", &self.targets())
            .finish_non_exhaustive()
    }
}

impl TargetRouter {
    /// Creates a router. Queue threads are named `{thread_name}-{target}`.
    pub fn new<F>(thread_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&str) -> PathDbResult<MethodDispatcher> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            thread_name: thread_name.into(),
            targets: Mutex::new(HashMap::new()),
        }
    }

    fn dispatcher_for(&self, target: &str) -> PathDbResult<Arc<SerializingMethodDispatcher>> {
        let mut targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = targets.get(target) {
            return Ok(Arc::clone(existing));
        }

        let method = (self.factory)(target)?;
        let config = TaskQueueConfig {
            thread_name: format!("{}-{target}", self.thread_name),
        };
        let dispatcher = Arc::new(SerializingMethodDispatcher::new(method, config)?);
        debug!(target_name = target, "created target dispatcher");
        targets.insert(target.to_string(), Arc::clone(&dispatcher));
        Ok(dispatcher)
    }

    /// Routes a call and runs `then` with its result inside the target's queue turn.
    pub fn route<F>(
        &self,
        target: &str,
        operation: &str,
        args: Vec<Value>,
        then: F,
    ) -> Eventual<Value>
    where
        F: FnOnce(&PathDbResult<Value>) + Send + 'static,
    {
        match self.dispatcher_for(target) {
            Ok(dispatcher) => dispatcher.call_and_then(operation, args, then),
            Err(err) => {
                let result = Err(err);
                then(&result);
                Eventual::ready(result)
            }
        }
    }

    /// Drops the dispatcher of `target`; the next call recreates it.
    pub fn forget(&self, target: &str) -> bool {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(target)
            .is_some()
    }

    /// Targets that currently have a dispatcher, sorted.
    #[must_use]
    pub fn targets(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }
}

impl Dispatcher for TargetRouter {
    fn exec(&self, target: &str, operation: &str, args: Vec<Value>) -> Eventual<Value> {
        match self.dispatcher_for(target) {
            Ok(dispatcher) => dispatcher.call(operation, args),
            Err(err) => Eventual::err(err),
        }
    }
}
