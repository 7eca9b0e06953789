use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::DispatchError;
use crate::task::{Eventual, IntoEventual};

use super::Dispatcher;

/// A registered operation handler.
pub type Handler = Arc<dyn Fn(Vec<Value>) -> Eventual<Value> + Send + Sync>;

/// Closed table mapping operation names to handlers.
///
/// Names are checked when registering: a second handler for the same name
/// is rejected instead of silently replacing the first.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("HandlerTable").field("operations", &names).finish()
    }
}

impl HandlerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `operation`.
    ///
    /// The handler may return a plain `PathDbResult<Value>` or an
    /// `Eventual<Value>`; both are wrapped into the same eventual type.
    pub fn register<F, R>(
        &mut self,
        operation: impl Into<String>,
        handler: F,
    ) -> Result<&mut Self, DispatchError>
    where
        F: Fn(Vec<Value>) -> R + Send + Sync + 'static,
        R: IntoEventual<Value>,
    {
        let operation = operation.into();
        if self.handlers.contains_key(&operation) {
            return Err(DispatchError::DuplicateHandler { operation });
        }
        let handler: Handler = Arc::new(move |args| handler(args).into_eventual());
        self.handlers.insert(operation, handler);
        Ok(self)
    }

    /// Handler registered for `operation`.
    #[must_use]
    pub fn get(&self, operation: &str) -> Option<&Handler> {
        self.handlers.get(operation)
    }

    /// True if `operation` has a handler.
    #[must_use]
    pub fn contains(&self, operation: &str) -> bool {
        self.handlers.contains_key(operation)
    }

    /// Registered operation names, sorted.
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Direct dispatcher: looks up the handler and calls it on the caller's thread.
///
/// No ordering is imposed between overlapping calls.
#[derive(Debug, Clone)]
pub struct MethodDispatcher {
    table: Arc<HandlerTable>,
}

impl MethodDispatcher {
    /// Wraps a handler table.
    #[must_use]
    pub fn new(table: HandlerTable) -> Self {
        Self { table: Arc::new(table) }
    }

    /// Calls the handler for `operation`.
    pub fn call(&self, operation: &str, args: Vec<Value>) -> Eventual<Value> {
        match self.table.get(operation) {
            Some(handler) => handler(args),
            None => Eventual::err(DispatchError::UnknownOperation {
                operation: operation.to_string(),
            }),
        }
    }

    /// The underlying table.
    #[must_use]
    pub fn table(&self) -> &HandlerTable {
        &self.table
    }
}

impl Dispatcher for MethodDispatcher {
    fn exec(&self, _target: &str, operation: &str, args: Vec<Value>) -> Eventual<Value> {
        self.call(operation, args)
    }
}
