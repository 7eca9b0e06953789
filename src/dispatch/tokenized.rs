//! Token-correlated dispatch across an opaque transport.
//!
//! Each outstanding call is keyed by a token of the form
//! `TokenizedDispatcherMessage_<instance>_<call>`. A call stays pending
//! until a response with its token is announced or the transport reports
//! failure through [`TokenizedDispatcher::abort_all_pending_operations`].
//! There is no timeout.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{PathDbError, PathDbResult};
use crate::id;
use crate::task::{Eventual, OpenPromise, Resolver};

use super::wire::{Request, Response, WireMessage};
use super::Dispatcher;

/// Prefix shared by every token this module generates.
pub const TOKEN_PREFIX: &str = "TokenizedDispatcherMessage";

/// Ships a request across the boundary. An error means it was never sent.
pub type TransportFn = Arc<dyn Fn(Request) -> PathDbResult<()> + Send + Sync>;

/// Dispatcher for calls executed on the other side of a transport.
pub struct TokenizedDispatcher {
    base_token: String,
    transport: TransportFn,
    pending: Mutex<HashMap<String, Resolver<Value>>>,
}

impl fmt::Debug for TokenizedDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenizedDispatcher")
            .field("base_token", &self.base_token)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl TokenizedDispatcher {
    /// Creates a dispatcher with a fresh base token.
    pub fn new<F>(transport: F) -> Self
    where
        F: Fn(Request) -> PathDbResult<()> + Send + Sync + 'static,
    {
        Self {
            base_token: format!("{TOKEN_PREFIX}_{}", id::token_part()),
            transport: Arc::new(transport),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Resolver<Value>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Token prefix unique to this instance.
    #[must_use]
    pub fn base_token(&self) -> &str {
        &self.base_token
    }

    fn next_token(&self) -> String {
        format!("{}_{}", self.base_token, id::token_part())
    }

    /// True if `token` was generated by this instance.
    #[must_use]
    pub fn is_own_token(&self, token: &str) -> bool {
        token
            .strip_prefix(self.base_token.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }

    /// True if `message` belongs to this instance's traffic.
    pub fn is_own_message(&self, message: &impl WireMessage) -> bool {
        self.is_own_token(message.token())
    }

    /// Settles the call waiting on `response.token`.
    ///
    /// Returns false when no such call is pending (stale or duplicate delivery).
    pub fn announce_response(&self, response: Response) -> bool {
        let Some(resolver) = self.table().remove(&response.token) else {
            debug!(
                token = %response.token,
                operation = %response.operation,
                "ignoring response for unknown token"
            );
            return false;
        };
        resolver.settle(response.into_result());
        true
    }

    /// Rejects every outstanding call with `err` and empties the table.
    ///
    /// Returns the number of calls rejected.
    pub fn abort_all_pending_operations(&self, err: impl Into<PathDbError>) -> usize {
        let err = err.into();
        let drained: Vec<Resolver<Value>> =
            self.table().drain().map(|(_, resolver)| resolver).collect();
        let count = drained.len();
        if count > 0 {
            warn!(count, error = %err, "aborting pending operations");
        }
        for resolver in drained {
            resolver.reject(err.clone());
        }
        count
    }

    /// Calls awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.table().len()
    }
}

impl Dispatcher for TokenizedDispatcher {
    fn exec(&self, target: &str, operation: &str, args: Vec<Value>) -> Eventual<Value> {
        let token = self.next_token();
        let (resolver, eventual) = OpenPromise::new().split();

        // Register before sending: the transport may answer inline.
        self.table().insert(token.clone(), resolver);

        let request = Request::new(target, operation, args, token.clone());
        if let Err(err) = (self.transport)(request) {
            let unsent = self.table().remove(&token);
            if let Some(resolver) = unsent {
                resolver.reject(err);
            }
        }
        eventual
    }
}
