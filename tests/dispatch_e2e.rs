use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

use pathdb::{
    Dispatcher, Envelope, HandlerTable, MethodDispatcher, OpenPromise, PathDbError, Request,
    Response, SerializingMethodDispatcher, TaskQueue, TaskQueueConfig, TokenizedDispatcher,
    TransportError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn capture_transport() -> (TokenizedDispatcher, Receiver<Request>) {
    let (tx, rx) = unbounded();
    let dispatcher = TokenizedDispatcher::new(move |request| {
        let _ = tx.send(request);
        Ok(())
    });
    (dispatcher, rx)
}

#[test]
fn queue_runs_tasks_in_order_and_survives_a_rejection() {
    const TASKS: usize = 20;
    const FAILING: usize = 7;
    init_tracing();

    let queue = TaskQueue::new(TaskQueueConfig::default()).unwrap();
    let started = Arc::new(Mutex::new(Vec::new()));
    let running = Arc::new(AtomicBool::new(false));

    let eventuals: Vec<_> = (0..TASKS)
        .map(|i| {
            let started = Arc::clone(&started);
            let running = Arc::clone(&running);
            queue.add(move || {
                assert!(!running.swap(true, Ordering::SeqCst), "task {i} overlapped");
                started.lock().unwrap().push(i);

                let (resolver, eventual) = OpenPromise::new().split();
                let delay = rand::thread_rng().gen_range(0..5);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(delay));
                    running.store(false, Ordering::SeqCst);
                    if i == FAILING {
                        resolver.reject(PathDbError::internal("boom"));
                    } else {
                        resolver.resolve(i);
                    }
                });
                eventual
            })
        })
        .collect();

    for (i, eventual) in eventuals.into_iter().enumerate() {
        let result = eventual.wait();
        if i == FAILING {
            assert_eq!(result.unwrap_err(), PathDbError::internal("boom"));
        } else {
            assert_eq!(result.unwrap(), i);
        }
    }
    assert_eq!(*started.lock().unwrap(), (0..TASKS).collect::<Vec<_>>());
}

#[test]
fn queue_pending_count_drains() {
    const TASKS: usize = 4;
    let queue = TaskQueue::new(TaskQueueConfig::default()).unwrap();
    let (started_tx, started_rx) = unbounded::<usize>();

    let mut gates = Vec::new();
    let eventuals: Vec<_> = (0..TASKS)
        .map(|i| {
            let (gate_tx, gate_rx) = bounded::<()>(0);
            gates.push(gate_tx);
            let started_tx = started_tx.clone();
            queue.add(move || {
                let _ = started_tx.send(i);
                let _ = gate_rx.recv();
                pathdb::Eventual::ok(i)
            })
        })
        .collect();

    assert_eq!(started_rx.recv_timeout(Duration::from_secs(2)).unwrap(), 0);
    assert_eq!(queue.pending_count(), TASKS - 1);

    // Releasing task i lets task i + 1 start, which takes it off the count.
    let mut gates = gates.into_iter();
    for next in 1..TASKS {
        gates.next().unwrap().send(()).unwrap();
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(2)).unwrap(), next);
        assert_eq!(queue.pending_count(), TASKS - 1 - next);
    }
    gates.next().unwrap().send(()).unwrap();

    for (i, eventual) in eventuals.into_iter().enumerate() {
        assert_eq!(eventual.wait().unwrap(), i);
    }
    assert_eq!(queue.pending_count(), 0);
}

#[test]
fn responses_in_any_order_settle_the_right_calls() {
    const CALLS: usize = 16;
    let (dispatcher, requests) = capture_transport();

    let eventuals: Vec<_> = (0..CALLS)
        .map(|i| dispatcher.exec("db1", "echo", vec![json!(i)]))
        .collect();
    assert_eq!(dispatcher.pending_count(), CALLS);

    let mut received: Vec<Request> = requests.try_iter().collect();
    assert_eq!(received.len(), CALLS);
    received.shuffle(&mut rand::thread_rng());

    for request in &received {
        let answer = request.args[0].clone();
        assert!(dispatcher.announce_response(Response::from_result(request, Ok(answer))));
    }
    assert_eq!(dispatcher.pending_count(), 0);

    for (i, eventual) in eventuals.into_iter().enumerate() {
        assert_eq!(eventual.wait().unwrap(), json!(i));
    }

    // A duplicate delivery finds nothing to settle.
    let again = Response::from_result(&received[0], Ok(Value::Null));
    assert!(!dispatcher.announce_response(again));
}

#[test]
fn abort_rejects_every_pending_call() {
    init_tracing();
    let (dispatcher, requests) = capture_transport();
    let eventuals: Vec<_> =
        (0..5).map(|_| dispatcher.exec("db1", "get", vec![json!("k")])).collect();

    let aborted = dispatcher.abort_all_pending_operations(TransportError::Aborted {
        reason: "shutdown".to_string(),
    });
    assert_eq!(aborted, 5);
    assert_eq!(dispatcher.pending_count(), 0);

    for eventual in eventuals {
        let err = eventual.wait().unwrap_err();
        assert!(matches!(err, PathDbError::Transport(TransportError::Aborted { .. })));
    }

    let late = requests.try_recv().unwrap();
    assert!(!dispatcher.announce_response(Response::from_result(&late, Ok(json!(1)))));
}

#[test]
fn tokens_identify_their_dispatcher() {
    let (first, first_requests) = capture_transport();
    let (second, _second_requests) = capture_transport();
    let _pending = first.exec("db1", "count", vec![]);
    let request = first_requests.try_recv().unwrap();

    assert!(first.is_own_message(&request));
    assert!(!second.is_own_message(&request));
    assert!(!first.is_own_token(first.base_token()));
    assert!(!first.is_own_token(&format!("{}x_1", first.base_token())));
}

#[test]
fn request_survives_the_text_boundary() {
    let (dispatcher, requests) = capture_transport();
    let _pending = dispatcher.exec("db1", "get", vec![json!("k")]);
    let sent = requests.try_recv().unwrap();
    assert!(!sent.token.is_empty());

    let text = Envelope::Request(sent.clone()).encode().unwrap();
    let Envelope::Request(received) = Envelope::decode(&text).unwrap() else {
        panic!("expected a request envelope");
    };
    assert_eq!(received, sent);
    assert_eq!(received.target, "db1");
    assert_eq!(received.operation, "get");
    assert_eq!(received.args, vec![json!("k")]);
}

#[test]
fn remote_error_keeps_name_and_message() {
    let (dispatcher, requests) = capture_transport();
    let pending = dispatcher.exec("db1", "get", vec![]);
    let request = requests.try_recv().unwrap();

    let failure: PathDbError = pathdb::DispatchError::UnknownOperation {
        operation: "get".to_string(),
    }
    .into();
    dispatcher.announce_response(Response::from_result(&request, Err(failure.clone())));

    let err = pending.wait().unwrap_err();
    assert_eq!(err.name(), "DispatchError");
    assert_eq!(err.to_record(), failure.to_record());
    assert!(err.to_string().contains("Unknown operation: get"));
}

#[test]
fn serializing_dispatcher_answers_in_call_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut table = HandlerTable::new();
    let handler_log = Arc::clone(&log);
    table
        .register("slow", move |args: Vec<Value>| -> pathdb::PathDbResult<Value> {
            let n = args[0].as_u64().unwrap_or_default();
            thread::sleep(Duration::from_millis(rand::thread_rng().gen_range(0..3)));
            handler_log.lock().unwrap().push(n);
            Ok(json!(n))
        })
        .unwrap();

    let dispatcher =
        SerializingMethodDispatcher::new(MethodDispatcher::new(table), TaskQueueConfig::default())
            .unwrap();
    let eventuals: Vec<_> =
        (0..10u64).map(|n| dispatcher.exec("db1", "slow", vec![json!(n)])).collect();
    for (n, eventual) in eventuals.into_iter().enumerate() {
        assert_eq!(eventual.wait().unwrap(), json!(n));
    }
    assert_eq!(*log.lock().unwrap(), (0..10u64).collect::<Vec<_>>());
}
