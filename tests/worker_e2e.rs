use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};

use pathdb::{
    ConflictHandler, ConflictInfo, ConflictResolution, Database, DatabaseConfig, Dispatcher,
    HandlerTable, MethodDispatcher, NodePath, OpenPromise, PathDbError, RemoteDatabase, Resolver,
    TargetRouter, ThreadWorker, ThreadWorkerConfig, TransportError, WorkerHost,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn worker_with(names: &[&str]) -> (Vec<Database>, Arc<ThreadWorker>) {
    init_tracing();
    let databases: Vec<Database> = names
        .iter()
        .map(|name| Database::in_memory(DatabaseConfig::named(*name)))
        .collect();
    let hosted = databases.clone();
    let worker = ThreadWorker::spawn(ThreadWorkerConfig::default(), move || {
        Ok(WorkerHost::with_databases("e2e-targets", hosted))
    })
    .unwrap();
    (databases, Arc::new(worker))
}

#[test]
fn remote_database_behaves_like_a_local_one() {
    let (databases, worker) = worker_with(&["db1"]);
    let remote = RemoteDatabase::new(worker.clone(), "db1");

    let mut batch = remote.batch();
    batch
        .put("users/alice", json!({"name": "Alice", "tags": ["a", "b"]}))
        .unwrap()
        .update("users/alice/tags/1", "c")
        .unwrap();
    let key = batch.add_list_item("todos", "ship it").unwrap();
    batch.write().unwrap().wait().unwrap();

    assert_eq!(remote.get("users/alice/tags").wait().unwrap(), json!(["a", "c"]));
    assert_eq!(remote.get(format!("todos/{key}")).wait().unwrap(), json!("ship it"));
    assert_eq!(remote.get("nobody").wait().unwrap(), Value::Null);
    assert_eq!(remote.count(None).wait().unwrap(), json!(2));
    assert_eq!(
        remote.keys(Some(&NodePath::parse("users").unwrap())).wait().unwrap(),
        json!(["users/alice"])
    );

    // The hosted database saw the same writes.
    assert_eq!(databases[0].get("users/alice/name").unwrap(), Some(json!("Alice")));
}

#[test]
fn remote_subscribers_on_the_host_see_remote_commits() {
    let (databases, worker) = worker_with(&["db1"]);
    let sub = databases[0].subscribe("settings").unwrap();
    let remote = RemoteDatabase::new(worker, "db1");

    let mut tx = remote.transaction();
    tx.put("settings/theme", "dark").unwrap();
    tx.commit().unwrap().wait().unwrap();

    let event = sub.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(event.value, json!({"theme": "dark"}));
}

#[test]
fn targets_are_independent() {
    let (databases, worker) = worker_with(&["left", "right"]);
    let left = RemoteDatabase::new(worker.clone(), "left");
    let right = RemoteDatabase::new(worker.clone(), "right");

    let mut batch = left.batch();
    batch.put("k", 1).unwrap();
    batch.write().unwrap().wait().unwrap();

    assert_eq!(right.get("k").wait().unwrap(), Value::Null);
    assert_eq!(databases[0].get("k").unwrap(), Some(json!(1)));

    let missing = RemoteDatabase::new(worker, "nowhere");
    let err = missing.count(None).wait().unwrap_err();
    assert_eq!(err.name(), "StateError");
}

#[test]
fn remote_failures_arrive_as_records() {
    let (_databases, worker) = worker_with(&["db1"]);
    let remote = RemoteDatabase::new(worker, "db1");

    let mut batch = remote.batch();
    batch.update("absent/0", 1).unwrap();
    let err = batch.write().unwrap().wait().unwrap_err();
    assert_eq!(err.name(), "StorageError");
    assert!(matches!(err, PathDbError::Remote(_)));
}

#[test]
fn close_propagates_to_the_host() {
    let (databases, worker) = worker_with(&["db1"]);
    let remote = RemoteDatabase::new(worker, "db1");

    remote.close().wait().unwrap();
    assert!(remote.is_closed());
    assert!(databases[0].is_closed());
    assert!(remote.batch().put("a", 1).unwrap_err().is_state());
}

#[test]
fn unanswered_call_waits_until_terminate() {
    init_tracing();
    let parked: Arc<Mutex<Vec<Resolver<Value>>>> = Arc::new(Mutex::new(Vec::new()));
    let handler_parked = Arc::clone(&parked);

    let worker = ThreadWorker::spawn(ThreadWorkerConfig::default(), move || {
        let router = TargetRouter::new("hang-targets", move |_target: &str| {
            let mut table = HandlerTable::new();
            let parked = Arc::clone(&handler_parked);
            table.register("hang", move |_args: Vec<Value>| {
                let (resolver, eventual) = OpenPromise::new().split();
                parked.lock().unwrap().push(resolver);
                eventual
            })?;
            Ok(MethodDispatcher::new(table))
        });
        Ok(WorkerHost::new(router))
    })
    .unwrap();

    let pending = worker.exec("svc", "hang", vec![]);
    let err = pending.wait_timeout(Duration::from_millis(100)).unwrap_err();
    assert!(matches!(err, PathDbError::Transport(TransportError::Timeout { .. })));
    assert_eq!(worker.pending_count(), 1);

    worker.terminate();
    let err = pending.wait().unwrap_err();
    assert!(matches!(err, PathDbError::Transport(TransportError::Aborted { .. })));
    assert_eq!(worker.pending_count(), 0);
    assert_eq!(parked.lock().unwrap().len(), 1);
}

#[test]
fn conflict_records_cross_the_boundary_unchanged() {
    init_tracing();
    let handler: ConflictHandler = Arc::new(|info: ConflictInfo| {
        if info.remote_is_newer() {
            pathdb::Eventual::ok(ConflictResolution::KeepRemote)
        } else {
            pathdb::Eventual::ok(ConflictResolution::KeepLocal)
        }
    });

    let worker = ThreadWorker::spawn(ThreadWorkerConfig::default(), move || {
        let router = TargetRouter::new("sync-targets", move |_target: &str| {
            let mut table = HandlerTable::new();
            let handler = Arc::clone(&handler);
            table.register("resolve", move |args: Vec<Value>| -> pathdb::PathDbResult<Value> {
                let info: ConflictInfo = serde_json::from_value(args[0].clone())
                    .map_err(|e| PathDbError::internal(e.to_string()))?;
                let resolution = handler(info.clone()).wait()?;
                Ok(json!({"echo": info, "resolution": resolution}))
            })?;
            Ok(MethodDispatcher::new(table))
        });
        Ok(WorkerHost::new(router))
    })
    .unwrap();

    let now = Utc::now();
    let info = ConflictInfo {
        key: "alice".to_string(),
        path: NodePath::parse("users/alice").unwrap(),
        local_value: json!({"name": "Alice"}),
        remote_value: json!({"name": "Alicia"}),
        local_update_time: Some(now),
        remote_update_time: Some(now + chrono::Duration::seconds(1)),
        remote_commit_time: None,
    };

    let answer = worker
        .exec("sync", "resolve", vec![serde_json::to_value(&info).unwrap()])
        .wait()
        .unwrap();
    let echoed: ConflictInfo = serde_json::from_value(answer["echo"].clone()).unwrap();
    assert_eq!(echoed, info);
    assert_eq!(answer["resolution"], json!({"type": "keep_remote"}));
}
