use std::sync::Arc;

use crate::database::Database;
use crate::dispatch::{MethodDispatcher, Request, Response, TargetRouter};
use crate::error::{PathDbResult, StateError};

/// Worker side of a boundary: turns requests into responses.
///
/// Calls are routed per target, so requests for the same target run in
/// arrival order while other targets proceed independently.
#[derive(Debug, Clone)]
pub struct WorkerHost {
    router: Arc<TargetRouter>,
}

impl WorkerHost {
    /// Hosts the targets produced by `router`.
    #[must_use]
    pub fn new(router: TargetRouter) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    /// Hosts a fixed set of databases, addressed by name.
    pub fn with_databases(thread_name: impl Into<String>, databases: Vec<Database>) -> Self {
        let databases = Arc::new(databases);
        let router = TargetRouter::new(
            thread_name,
            move |target: &str| -> PathDbResult<MethodDispatcher> {
                let db = databases
                    .iter()
                    .find(|db| db.name() == target)
                    .ok_or_else(|| StateError::DatabaseClosed {
                        name: target.to_string(),
                    })?;
                Ok(MethodDispatcher::new(db.handler_table()?))
            },
        );
        Self::new(router)
    }

    /// Runs `request` and hands its response to `reply` once settled.
    ///
    /// Errors are reduced to their `{name, message}` record.
    pub fn handle<F>(&self, request: Request, reply: F)
    where
        F: FnOnce(Response) + Send + 'static,
    {
        let Request {
            target,
            operation,
            args,
            token,
        } = request;
        let echo = Request::new(target.clone(), operation.clone(), Vec::new(), token);
        // The eventual is dropped: `reply` receives the outcome inside the queue turn.
        let _ = self.router.route(&target, &operation, args, move |result| {
            reply(Response::from_result(&echo, result.clone()));
        });
    }

    /// The router behind this host.
    #[must_use]
    pub fn router(&self) -> &TargetRouter {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crossbeam_channel::unbounded;
    use serde_json::json;

    use crate::database::DatabaseConfig;

    #[test]
    fn responses_echo_request_fields() {
        let db = Database::in_memory(DatabaseConfig::named("db1"));
        let host = WorkerHost::with_databases("test-host", vec![db]);
        let (tx, rx) = unbounded();

        let req = Request::new("db1", "count", vec![], "tok-1");
        let t = tx.clone();
        host.handle(req, move |resp| {
            let _ = t.send(resp);
        });
        let resp = rx.recv().unwrap();
        assert_eq!(resp.token, "tok-1");
        assert_eq!(resp.target, "db1");
        assert_eq!(resp.operation, "count");
        assert_eq!(resp.result, Some(json!(0)));
    }

    #[test]
    fn unknown_target_and_operation_become_error_records() {
        let db = Database::in_memory(DatabaseConfig::named("db1"));
        let host = WorkerHost::with_databases("test-host", vec![db]);
        let (tx, rx) = unbounded();

        let t = tx.clone();
        host.handle(Request::new("db2", "count", vec![], "a"), move |resp| {
            let _ = t.send(resp);
        });
        host.handle(Request::new("db1", "frobnicate", vec![], "b"), move |resp| {
            let _ = tx.send(resp);
        });

        let mut responses = vec![rx.recv().unwrap(), rx.recv().unwrap()];
        responses.sort_by(|a, b| a.token.cmp(&b.token));
        assert_eq!(responses[0].error.as_ref().unwrap().name, "StateError");
        assert_eq!(responses[1].error.as_ref().unwrap().name, "DispatchError");
        assert!(responses.iter().all(|r| r.result.is_none()));
    }
}
