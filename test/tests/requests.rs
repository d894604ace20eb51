/// Request/response and acknowledged sends across the local network
use std::time::Duration;

use tilesync_server::{ErrorEvent, RequestEvent};
use tilesync_shared::{RequestOptions, RequestOutcome, SyncError};
use tilesync_test::{
    drain_server, HeightQuery, HeightReply, Ping, SlowQuery, SlowReply, TestNetwork,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn request_is_answered_by_handler() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let now = network.now;

    let mut future = network.clients[0]
        .send_request::<HeightQuery, HeightReply>(
            HeightQuery { x: 3, y: 7 },
            RequestOptions::default(),
            now,
        )
        .unwrap();
    assert!(future.try_take().is_none());

    network.run_for(Duration::from_millis(50));

    match future.try_take() {
        Some(RequestOutcome::Responded { context, response }) => {
            assert_eq!(response, HeightReply { height: 307 });
            assert!(context.sender.is_server());
            assert_eq!(context.request_id, future.request_id());
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn handler_fault_is_contained_and_request_times_out() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let now = network.now;

    let mut future = network.clients[0]
        .send_request::<HeightQuery, HeightReply>(
            HeightQuery { x: -1, y: 0 },
            RequestOptions::with_timeout(Duration::from_millis(200)),
            now,
        )
        .unwrap();

    let mut steps = network.run_for(Duration::from_millis(150));
    assert!(future.try_take().is_none());
    let errors = drain_server::<ErrorEvent, _>(&mut steps);
    assert!(matches!(errors.as_slice(), [SyncError::Handler(_)]));

    network.run_for(Duration::from_millis(100));
    assert_eq!(future.try_take(), Some(RequestOutcome::NotResponded));
}

#[test]
fn acknowledged_send_reports_status() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let now = network.now;

    let mut accepted = network.clients[0]
        .send_request_ack(Ping { value: 5 }, RequestOptions::default(), now)
        .unwrap();
    let mut refused = network.clients[0]
        .send_request_ack(Ping { value: 0 }, RequestOptions::default(), now)
        .unwrap();

    network.run_for(Duration::from_millis(50));

    let accepted = accepted.try_take().unwrap();
    assert!(accepted.is_success());
    let refused = refused.try_take().unwrap();
    assert!(refused.responded);
    assert_eq!(refused.error_code, Some(7));
}

#[test]
fn application_answers_request_later() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let now = network.now;

    let mut future = network.clients[0]
        .send_request::<SlowQuery, SlowReply>(
            SlowQuery { token: 44 },
            RequestOptions::default(),
            now,
        )
        .unwrap();

    let mut steps = network.run_for(Duration::from_millis(30));
    let requests = drain_server::<RequestEvent<SlowQuery>, _>(&mut steps);
    assert_eq!(requests.len(), 1);
    let (handle, query) = requests.into_iter().next().unwrap();
    assert_eq!(handle.peer(), network.peer(0));

    network.run_for(Duration::from_millis(100));
    assert!(future.try_take().is_none());

    network
        .server
        .send_response(handle, SlowReply { token: query.token })
        .unwrap();
    network.run_for(Duration::from_millis(50));

    assert_eq!(
        future.try_take().and_then(RequestOutcome::into_response),
        Some(SlowReply { token: 44 })
    );
}

#[test]
fn unanswered_request_times_out_after_default() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let now = network.now;

    let mut future = network.clients[0]
        .send_request::<SlowQuery, SlowReply>(
            SlowQuery { token: 1 },
            RequestOptions::default(),
            now,
        )
        .unwrap();
    assert_eq!(future.deadline(), now + Duration::from_millis(5000));

    network.run_for(Duration::from_millis(4900));
    assert!(future.try_take().is_none());

    network.run_for(Duration::from_millis(200));
    assert_eq!(future.try_take(), Some(RequestOutcome::NotResponded));
}

#[test]
fn disconnect_resolves_outstanding_requests() {
    init_logger();
    let mut network = TestNetwork::new(1);
    let now = network.now;

    let mut future = network.clients[0]
        .send_request::<SlowQuery, SlowReply>(
            SlowQuery { token: 2 },
            RequestOptions::default(),
            now,
        )
        .unwrap();

    network.clients[0].disconnect().unwrap();
    assert_eq!(future.try_take(), Some(RequestOutcome::NotResponded));
    assert!(network.clients[0].disconnect().is_err());
}
