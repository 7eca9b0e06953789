//! Dispatch operations exposed by a [`Database`].
//!
//! | operation | args                  | result                      |
//! |-----------|-----------------------|-----------------------------|
//! | `get`     | `[path]`              | value or `null`             |
//! | `commit`  | `[transaction]`       | `null`                      |
//! | `close`   | `[]`                  | `null`                      |
//! | `count`   | `[]` or `[prefix]`    | number of leaves            |
//! | `keys`    | `[]` or `[prefix]`    | list of `"a/b"` path strings |
//!
//! Paths travel either as `"a/b/0"` strings or as segment arrays.

use serde_json::Value;

use crate::batch::Transaction;
use crate::dispatch::args::{arg, expect_args, expect_at_most};
use crate::dispatch::HandlerTable;
use crate::error::{PathDbResult, ValidationError};
use crate::path::{EntityPath, NodePath};
use crate::task::Eventual;

use super::Database;

fn invalid(operation: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidArgument {
        operation: operation.to_string(),
        reason: reason.into(),
    }
}

fn entity_path_arg(operation: &str, raw: &Value) -> PathDbResult<EntityPath> {
    match raw {
        Value::String(s) => Ok(EntityPath::parse(s)?),
        Value::Array(_) => serde_json::from_value(raw.clone())
            .map_err(|e| invalid(operation, e.to_string()).into()),
        other => Err(invalid(operation, format!("expected a path, got {other}")).into()),
    }
}

fn prefix_arg(operation: &str, args: &[Value]) -> PathDbResult<Option<NodePath>> {
    expect_at_most(operation, args, 1)?;
    match args.first() {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(NodePath::parse(s)?)),
        Some(raw) => {
            let path = arg(operation, args, 0)
                .map_err(|_| invalid(operation, format!("expected a node path, got {raw}")))?;
            Ok(Some(path))
        }
    }
}

impl Database {
    /// Handler table exposing this database as a dispatch target.
    pub fn handler_table(&self) -> PathDbResult<HandlerTable> {
        let mut table = HandlerTable::new();

        let db = self.clone();
        table.register("get", move |args: Vec<Value>| -> PathDbResult<Value> {
            expect_args("get", &args, 1)?;
            let path = entity_path_arg("get", &args[0])?;
            Ok(db.get(path)?.unwrap_or(Value::Null))
        })?;

        let db = self.clone();
        table.register("commit", move |args: Vec<Value>| {
            if let Err(err) = expect_args("commit", &args, 1) {
                return Eventual::err(err);
            }
            match arg::<Transaction>("commit", &args, 0) {
                Ok(transaction) => db.commit(transaction),
                Err(err) => Eventual::err(err),
            }
        })?;

        let db = self.clone();
        table.register("close", move |args: Vec<Value>| -> PathDbResult<Value> {
            expect_args("close", &args, 0)?;
            db.close();
            Ok(Value::Null)
        })?;

        let db = self.clone();
        table.register("count", move |args: Vec<Value>| -> PathDbResult<Value> {
            let prefix = prefix_arg("count", &args)?;
            Ok(Value::from(db.count(prefix)?))
        })?;

        let db = self.clone();
        table.register("keys", move |args: Vec<Value>| -> PathDbResult<Value> {
            let prefix = prefix_arg("keys", &args)?;
            let keys = db.keys(prefix)?;
            Ok(Value::Array(keys.iter().map(|k| Value::String(k.to_string())).collect()))
        })?;

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::database::DatabaseConfig;
    use crate::dispatch::{Dispatcher, MethodDispatcher};

    fn dispatcher() -> (Database, MethodDispatcher) {
        let db = Database::in_memory(DatabaseConfig::named("db1"));
        let table = db.handler_table().unwrap();
        (db, MethodDispatcher::new(table))
    }

    #[test]
    fn commit_then_get_through_dispatch() {
        let (_db, d) = dispatcher();
        let tx = json!([
            {"type": "put", "path": ["users", "alice"], "value": {"age": 30}},
            {"type": "update", "path": ["users", "alice", "age"], "value": 31}
        ]);
        assert_eq!(d.exec("db1", "commit", vec![tx]).wait().unwrap(), Value::Null);
        assert_eq!(d.exec("db1", "get", vec![json!("users/alice/age")]).wait().unwrap(), json!(31));
        let alice = d.exec("db1", "get", vec![json!(["users", "alice"])]).wait().unwrap();
        assert_eq!(alice, json!({"age": 31}));
        assert_eq!(d.exec("db1", "get", vec![json!("nobody")]).wait().unwrap(), Value::Null);
    }

    #[test]
    fn count_and_keys_accept_optional_prefix() {
        let (db, d) = dispatcher();
        let mut batch = db.batch();
        batch.put("a/x", 1).unwrap().put("a/y", 2).unwrap().put("b", 3).unwrap();
        batch.write().unwrap().wait().unwrap();

        assert_eq!(d.exec("db1", "count", vec![]).wait().unwrap(), json!(3));
        assert_eq!(d.exec("db1", "count", vec![json!("a")]).wait().unwrap(), json!(2));
        let keys = d.exec("db1", "keys", vec![json!(["a"])]).wait().unwrap();
        assert_eq!(keys, json!(["a/x", "a/y"]));
    }

    #[test]
    fn wrong_arguments_are_validation_errors() {
        let (_db, d) = dispatcher();
        assert!(d.exec("db1", "get", vec![]).wait().unwrap_err().is_validation());
        assert!(d.exec("db1", "get", vec![json!(5)]).wait().unwrap_err().is_validation());
        assert!(d.exec("db1", "commit", vec![json!("nope")]).wait().unwrap_err().is_validation());
        let err = d.exec("db1", "count", vec![json!("a"), json!("b")]).wait().unwrap_err();
        assert!(err.is_validation());
        assert!(d
            .exec("db1", "commit", vec![json!([{"type": "put", "path": ["l", 0], "value": 1}])])
            .wait()
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn close_operation_closes_database() {
        let (db, d) = dispatcher();
        d.exec("db1", "close", vec![]).wait().unwrap();
        assert!(db.is_closed());
        assert!(d.exec("db1", "get", vec![json!("a")]).wait().unwrap_err().is_state());
    }
}
