use std::sync::Arc;

use serde_json::Value;

use crate::error::PathDbResult;
use crate::task::{Eventual, TaskQueue, TaskQueueConfig};

use super::method::MethodDispatcher;
use super::Dispatcher;

/// Method dispatcher whose calls run strictly one at a time.
///
/// Each call waits for the previous one to settle, success or failure,
/// before it starts. Ordering holds per instance only.
#[derive(Debug)]
pub struct SerializingMethodDispatcher {
    inner: Arc<MethodDispatcher>,
    queue: TaskQueue,
}

impl SerializingMethodDispatcher {
    /// Wraps `inner` with its own task queue.
    pub fn new(inner: MethodDispatcher, config: TaskQueueConfig) -> PathDbResult<Self> {
        Ok(Self {
            inner: Arc::new(inner),
            queue: TaskQueue::new(config)?,
        })
    }

    /// Queues `operation` behind every earlier call.
    pub fn call(&self, operation: &str, args: Vec<Value>) -> Eventual<Value> {
        let inner = Arc::clone(&self.inner);
        let operation = operation.to_string();
        self.queue.add(move || inner.call(&operation, args))
    }

    /// Queues `operation` and runs `then` with its result before the next call starts.
    pub fn call_and_then<F>(&self, operation: &str, args: Vec<Value>, then: F) -> Eventual<Value>
    where
        F: FnOnce(&PathDbResult<Value>) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let operation = operation.to_string();
        self.queue.add(move || {
            let result = inner.call(&operation, args).wait();
            then(&result);
            Eventual::ready(result)
        })
    }

    /// Calls queued but not yet started.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.pending_count()
    }
}

impl Dispatcher for SerializingMethodDispatcher {
    fn exec(&self, _target: &str, operation: &str, args: Vec<Value>) -> Eventual<Value> {
        self.call(operation, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use serde_json::json;

    use crate::dispatch::method::HandlerTable;
    use crate::error::PathDbError;

    fn serializing(table: HandlerTable) -> SerializingMethodDispatcher {
        SerializingMethodDispatcher::new(MethodDispatcher::new(table), TaskQueueConfig::default())
            .unwrap()
    }

    #[test]
    fn overlapping_calls_never_interleave() {
        let busy = Arc::new(AtomicBool::new(false));
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut table = HandlerTable::new();
        let (b, l) = (Arc::clone(&busy), Arc::clone(&log));
        table
            .register("slow", move |args: Vec<Value>| -> PathDbResult<Value> {
                if b.swap(true, Ordering::SeqCst) {
                    return Err(PathDbError::internal("overlap"));
                }
                thread::sleep(Duration::from_millis(3));
                l.lock().unwrap().push(args[0].clone());
                b.store(false, Ordering::SeqCst);
                Ok(args[0].clone())
            })
            .unwrap();

        let d = serializing(table);
        let calls: Vec<_> = (0..5).map(|i| d.exec("db", "slow", vec![json!(i)])).collect();
        for (i, c) in calls.into_iter().enumerate() {
            assert_eq!(c.wait().unwrap(), json!(i));
        }
        assert_eq!(*log.lock().unwrap(), (0..5).map(|i| json!(i)).collect::<Vec<_>>());
    }

    #[test]
    fn unknown_operation_does_not_stall_queue() {
        let mut table = HandlerTable::new();
        table
            .register("ok", |_args: Vec<Value>| -> PathDbResult<Value> { Ok(json!(true)) })
            .unwrap();
        let d = serializing(table);

        let bad = d.call("missing", vec![]);
        let good = d.call("ok", vec![]);
        assert!(bad.wait().unwrap_err().is_dispatch());
        assert_eq!(good.wait().unwrap(), json!(true));
    }

    #[test]
    fn then_callback_runs_before_next_call() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut table = HandlerTable::new();
        let o = Arc::clone(&order);
        table
            .register("mark", move |args: Vec<Value>| -> PathDbResult<Value> {
                o.lock().unwrap().push(format!("call {}", args[0]));
                Ok(Value::Null)
            })
            .unwrap();
        let d = serializing(table);

        let o = Arc::clone(&order);
        let first = d.call_and_then("mark", vec![json!(1)], move |_| {
            o.lock().unwrap().push("then 1".to_string());
        });
        let second = d.call("mark", vec![json!(2)]);
        first.wait().unwrap();
        second.wait().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["call 1", "then 1", "call 2"]);
    }
}
