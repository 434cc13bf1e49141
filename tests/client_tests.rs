#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration-style tests for `RealtimeClient`.
//!
//! Every test runs on a paused tokio clock and talks to the client through
//! the scripted `MockConnector` from `tests/common`, so backoff delays,
//! heartbeat periods and connect timeouts are asserted exactly.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use realtime_client::protocol::{ClientFrame, ServerFrame};
use realtime_client::{
    ConnectionState, DisconnectReason, EventName, RealtimeClient, RealtimeError,
    ReconnectScheduled,
};
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use common::{
    event_names, join, manual_config, recorded, recorder, server_event, settle, MockConnector,
    Outcome,
};

// ════════════════════════════════════════════════════════════════════
// Connection lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn connect_transitions_to_connected_and_notifies() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let connects = recorder();
    let log = Arc::clone(&connects);
    client.on_connect(move |info| log.lock().unwrap().push(info.is_reconnection));

    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_ok!(client.connect().await);
    let _server = handle.next_server().await;

    assert!(client.is_connected());
    let snapshot = client.state();
    assert!(snapshot.session_id.is_some());
    assert!(snapshot.heartbeat_active);
    assert_eq!(snapshot.reconnect_attempt, 0);
    assert_eq!(recorded(&connects), vec![false]);
    assert_eq!(client.stats().total_connections, 1);
}

#[tokio::test(start_paused = true)]
async fn connect_times_out_when_the_connector_hangs() {
    let (connector, handle) = MockConnector::new();
    handle.script([Outcome::Hang]);
    let config = manual_config().with_connect_timeout(Duration::from_secs(3));
    let client = RealtimeClient::new(config, connector);

    let started = Instant::now();
    let err = assert_err!(client.connect().await);
    assert!(matches!(err, RealtimeError::Timeout));
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_settles_a_pending_connect() {
    let (connector, handle) = MockConnector::new();
    handle.script([Outcome::Hang]);
    let client = Arc::new(RealtimeClient::new(manual_config(), connector));

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.connect().await })
    };
    settle().await;
    assert!(client.is_connecting());

    client.disconnect();
    let result = pending.await.unwrap();
    assert!(matches!(result, Err(RealtimeError::ConnectAborted)));
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn manual_disconnect_closes_transport_and_does_not_reconnect() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let reasons = recorder();
    let log = Arc::clone(&reasons);
    client.on_disconnect(move |info| {
        log.lock().unwrap().push((info.reason.clone(), info.was_connected));
    });

    client.connect().await.unwrap();
    let server = handle.next_server().await;
    client.disconnect();
    settle().await;

    assert!(server.is_closed());
    assert_eq!(
        recorded(&reasons),
        vec![(DisconnectReason::ClientDisconnect, true)]
    );

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(handle.attempt_count(), 1);
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(client.stats().total_disconnections, 1);
}

// ════════════════════════════════════════════════════════════════════
// Reconnection
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn backoff_schedule_is_exponential_and_bounded() {
    let (connector, mut handle) = MockConnector::new();
    let config = manual_config()
        .with_reconnect_attempts(3)
        .with_reconnect_delay(Duration::from_millis(1000))
        .with_max_reconnect_delay(Duration::from_millis(5000));
    let client = RealtimeClient::new(config, connector);

    let scheduled = recorder();
    let log = Arc::clone(&scheduled);
    client.on_reconnect(move |s| log.lock().unwrap().push(*s));
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&errors);
    client.on_error(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    handle.script([Outcome::Refuse, Outcome::Refuse, Outcome::Refuse]);

    let dropped_at = Instant::now();
    server.close();
    tokio::time::sleep(Duration::from_secs(60)).await;

    let attempts = handle.attempts();
    assert_eq!(attempts.len(), 4, "initial connect plus three reconnections");
    assert_eq!(attempts[1] - dropped_at, Duration::from_millis(1000));
    assert_eq!(attempts[2] - attempts[1], Duration::from_millis(2000));
    assert_eq!(attempts[3] - attempts[2], Duration::from_millis(4000));

    let expected: Vec<ReconnectScheduled> = [1000, 2000, 4000]
        .into_iter()
        .zip(1..)
        .map(|(ms, attempt)| ReconnectScheduled {
            attempt,
            max_attempts: 3,
            delay: Duration::from_millis(ms),
        })
        .collect();
    assert_eq!(recorded(&scheduled), expected);
    assert_eq!(errors.load(Ordering::SeqCst), 3);
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(client.state().reconnect_attempt, 3);
}

#[tokio::test(start_paused = true)]
async fn manual_connect_after_exhaustion_resets_and_replays() {
    let (connector, mut handle) = MockConnector::new();
    let config = manual_config()
        .with_reconnect_attempts(3)
        .with_reconnect_delay(Duration::from_millis(1000))
        .with_max_reconnect_delay(Duration::from_millis(5000));
    let client = RealtimeClient::new(config, connector);

    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    assert!(client.join_room("A"));
    settle().await;
    assert_eq!(server.frames(), vec![join("A")]);

    handle.script([Outcome::Refuse, Outcome::Refuse, Outcome::Refuse]);
    server.close();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(handle.attempt_count(), 4);

    assert!(!client.emit("answer", json!({"q": 1})));
    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    settle().await;

    let frames = server.frames();
    assert_eq!(frames.first(), Some(&join("A")));
    assert_eq!(event_names(&frames), vec!["answer"]);
    assert_eq!(client.state().reconnect_attempt, 0);
    assert_eq!(client.stats().total_reconnections, 1);
}

#[tokio::test(start_paused = true)]
async fn server_close_reconnects_and_restores_rooms() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let connects = recorder();
    let log = Arc::clone(&connects);
    client.on_connect(move |info| log.lock().unwrap().push(info.is_reconnection));

    client.connect().await.unwrap();
    let mut first = handle.next_server().await;
    client.join_room("course_1");
    settle().await;
    assert_eq!(first.frames(), vec![join("course_1")]);

    first.close();
    settle().await;
    assert!(client.is_reconnecting());

    let mut second = handle.next_server().await;
    settle().await;
    assert!(client.is_connected());
    assert_eq!(second.frames(), vec![join("course_1")]);
    assert_eq!(recorded(&connects), vec![false, true]);
}

#[tokio::test(start_paused = true)]
async fn transport_error_is_reported_then_reconnects() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let messages = recorder();
    let log = Arc::clone(&messages);
    client.on_error(move |info| log.lock().unwrap().push(info.message.clone()));
    let reasons = recorder();
    let log = Arc::clone(&reasons);
    client.on_disconnect(move |info| log.lock().unwrap().push(info.reason.clone()));

    client.connect().await.unwrap();
    let server = handle.next_server().await;
    server.fail("connection reset");
    settle().await;

    assert_eq!(recorded(&messages).len(), 1);
    assert!(recorded(&messages)[0].contains("connection reset"));
    assert!(matches!(
        recorded(&reasons).as_slice(),
        [DisconnectReason::TransportError(_)]
    ));
    assert!(client.is_reconnecting());
    assert_eq!(client.stats().errors, 1);

    let _server = handle.next_server().await;
    settle().await;
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn manual_connect_supersedes_pending_reconnection() {
    let (connector, mut handle) = MockConnector::new();
    let config = manual_config().with_reconnect_delay(Duration::from_secs(10));
    let client = RealtimeClient::new(config, connector);

    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    server.close();
    settle().await;
    assert!(client.is_reconnecting());

    let before = Instant::now();
    client.connect().await.unwrap();
    assert_eq!(before.elapsed(), Duration::ZERO);
    assert_eq!(handle.attempt_count(), 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(handle.attempt_count(), 2, "cancelled timer must not fire");
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnection() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);

    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    server.close();
    settle().await;
    assert!(client.is_reconnecting());

    client.disconnect();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(handle.attempt_count(), 1);
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

// ════════════════════════════════════════════════════════════════════
// Rooms
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn rooms_joined_offline_are_sent_exactly_once() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);

    assert!(!client.join_room("A"));
    assert!(!client.join_room("B"));
    assert!(client.join_room("A"));

    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    settle().await;

    assert_eq!(server.frames(), vec![join("A"), join("B")]);
    assert_eq!(client.state().joined_rooms, vec!["A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn room_joins_survive_an_unusable_queue() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config().with_message_queue_size(0), connector);

    client.join_room("A");
    assert!(!client.emit("dropped", json!(null)));
    assert_eq!(client.state().queue_size, 0);

    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    settle().await;
    assert_eq!(server.frames(), vec![join("A")]);
}

#[tokio::test(start_paused = true)]
async fn rooms_are_rejoined_after_manual_disconnect() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);

    client.connect().await.unwrap();
    let mut first = handle.next_server().await;
    assert!(client.join_room("A"));
    settle().await;
    assert_eq!(first.frames(), vec![join("A")]);

    client.disconnect();
    settle().await;
    assert_eq!(client.state().joined_rooms, vec!["A"]);

    client.connect().await.unwrap();
    let mut second = handle.next_server().await;
    settle().await;
    assert_eq!(second.frames(), vec![join("A")]);
}

#[tokio::test(start_paused = true)]
async fn leave_room_offline_prevents_replay() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);

    client.join_room("A");
    client.join_room("B");
    assert!(client.leave_room("A"));

    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    settle().await;
    assert_eq!(server.frames(), vec![join("B")]);

    assert!(client.leave_room("B"));
    settle().await;
    assert_eq!(
        server.frames(),
        vec![ClientFrame::LeaveRoom { room: "B".into() }]
    );
    assert_eq!(client.stats().room_count, 0);
}

// ════════════════════════════════════════════════════════════════════
// Message queue
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn queued_events_flush_in_order_before_new_ones() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);

    for name in ["one", "two", "three"] {
        assert!(!client.emit(name, json!(null)));
    }
    assert_eq!(client.state().queue_size, 3);

    client.connect().await.unwrap();
    assert!(client.emit("four", json!(null)));
    let mut server = handle.next_server().await;
    settle().await;

    assert_eq!(
        event_names(&server.frames()),
        vec!["one", "two", "three", "four"]
    );
    assert_eq!(client.state().queue_size, 0);
    assert_eq!(client.stats().messages_sent, 4);
}

#[tokio::test(start_paused = true)]
async fn full_queue_drops_new_events() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config().with_message_queue_size(2), connector);

    assert!(!client.emit("a", json!(1)));
    assert!(!client.emit("b", json!(2)));
    assert!(!client.emit("c", json!(3)));
    assert_eq!(client.state().queue_size, 2);

    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    settle().await;
    assert_eq!(event_names(&server.frames()), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn disabled_queue_drops_offline_events() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config().with_queue_enabled(false), connector);

    assert!(!client.emit("lost", json!(null)));
    assert_eq!(client.state().queue_size, 0);

    client.set_queue_enabled(true);
    assert!(!client.emit("kept", json!(null)));
    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    settle().await;
    assert_eq!(event_names(&server.frames()), vec!["kept"]);
}

#[tokio::test(start_paused = true)]
async fn clear_queue_discards_pending_events() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);

    client.emit("stale", json!(null));
    client.clear_queue();
    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    settle().await;
    assert!(event_names(&server.frames()).is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Event routing
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn server_events_reach_handlers_in_registration_order() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let calls = recorder();
    let first = Arc::clone(&calls);
    client.on("notification", move |payload| {
        first.lock().unwrap().push(format!("first:{payload}"));
    });
    let second = Arc::clone(&calls);
    client.on(EventName::Notification, move |payload| {
        second.lock().unwrap().push(format!("second:{payload}"));
    });

    client.connect().await.unwrap();
    let server = handle.next_server().await;
    server.push(server_event("notification", json!("hi")));
    server.push(server_event("unrelated", json!(null)));
    settle().await;

    assert_eq!(
        recorded(&calls),
        vec![r#"first:"hi""#.to_string(), r#"second:"hi""#.to_string()]
    );
    assert_eq!(client.stats().messages_received, 2);
}

#[tokio::test(start_paused = true)]
async fn off_removes_only_the_given_handler() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let calls = recorder();
    let a = Arc::clone(&calls);
    let id_a = client.on("tick", move |_| a.lock().unwrap().push("a"));
    let b = Arc::clone(&calls);
    client.on("tick", move |_| b.lock().unwrap().push("b"));

    assert!(client.off("tick", id_a));
    assert!(!client.off("tick", id_a));

    client.connect().await.unwrap();
    let server = handle.next_server().await;
    server.push(server_event("tick", json!(null)));
    settle().await;
    assert_eq!(recorded(&calls), vec!["b"]);

    assert_eq!(client.off_all("tick"), 1);
    server.push(server_event("tick", json!(null)));
    settle().await;
    assert_eq!(recorded(&calls), vec!["b"]);
}

#[tokio::test(start_paused = true)]
async fn panicking_handler_does_not_break_dispatch() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let calls = recorder();
    client.on("boom", |_| panic!("consumer bug"));
    let log = Arc::clone(&calls);
    client.on("boom", move |payload: &Value| log.lock().unwrap().push(payload.clone()));

    client.connect().await.unwrap();
    let server = handle.next_server().await;
    server.push(server_event("boom", json!(1)));
    server.push(server_event("boom", json!(2)));
    settle().await;

    assert_eq!(recorded(&calls), vec![json!(1), json!(2)]);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_skipped() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let calls = recorder();
    let log = Arc::clone(&calls);
    client.on("ok", move |_| log.lock().unwrap().push(()));

    client.connect().await.unwrap();
    let server = handle.next_server().await;
    server.push_raw("not json");
    server.push_raw(r#"{"type":"Mystery","data":{}}"#);
    server.push(server_event("ok", json!(null)));
    settle().await;

    assert_eq!(recorded(&calls).len(), 1);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn ack_callback_runs_once_with_server_payload() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    client.connect().await.unwrap();
    let mut server = handle.next_server().await;

    let acks = recorder();
    let log = Arc::clone(&acks);
    assert!(client.emit_with_ack("submit", json!({"answer": "B"}), move |reply| {
        log.lock().unwrap().push(reply);
    }));

    let id = match server.next_frame().await {
        ClientFrame::Event { event, ack, .. } => {
            assert_eq!(event, "submit");
            ack.expect("ack id attached")
        }
        other => panic!("expected Event, got {other:?}"),
    };
    server.push(ServerFrame::Ack {
        id,
        data: json!({"accepted": true}),
    });
    server.push(ServerFrame::Ack {
        id,
        data: json!({"accepted": false}),
    });
    settle().await;

    assert_eq!(recorded(&acks), vec![json!({"accepted": true})]);
}

// ════════════════════════════════════════════════════════════════════
// Progress subscriptions
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn progress_subscription_filters_by_session() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let updates = recorder();
    let log = Arc::clone(&updates);
    let id = client.subscribe_to_progress("s1", move |payload| {
        log.lock().unwrap().push(payload["progress"].clone());
    });

    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    settle().await;
    assert_eq!(server.frames(), vec![join("grading_s1")]);

    server.push(server_event(
        "grading_progress",
        json!({"session_id": "s1", "progress": 40}),
    ));
    server.push(server_event(
        "grading_progress",
        json!({"session_id": "s2", "progress": 90}),
    ));
    server.push(server_event(
        "grading_complete",
        json!({"session_id": "s1", "progress": 100}),
    ));
    settle().await;
    assert_eq!(recorded(&updates), vec![json!(40), json!(100)]);

    assert_eq!(client.unsubscribe_from_progress("s1", Some(id)), 1);
    settle().await;
    assert_eq!(
        server.frames(),
        vec![ClientFrame::LeaveRoom {
            room: "grading_s1".into()
        }]
    );

    server.push(server_event(
        "grading_progress",
        json!({"session_id": "s1", "progress": 50}),
    ));
    settle().await;
    assert_eq!(recorded(&updates).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn progress_room_kept_while_other_subscriptions_remain() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let first = client.subscribe_to_progress("s1", |_| {});
    client.subscribe_to_progress("s1", |_| {});

    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    settle().await;
    assert_eq!(server.frames(), vec![join("grading_s1")]);

    assert_eq!(client.unsubscribe_from_progress("s1", Some(first)), 1);
    settle().await;
    assert!(server.frames().is_empty());
    assert_eq!(client.state().joined_rooms, vec!["grading_s1"]);

    assert_eq!(client.unsubscribe_from_progress("s1", None), 1);
    assert!(client.state().joined_rooms.is_empty());
    assert_eq!(client.unsubscribe_from_progress("s1", None), 0);
}

// ════════════════════════════════════════════════════════════════════
// Heartbeat
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn heartbeat_measures_latency_from_pong() {
    let (connector, mut handle) = MockConnector::new();
    let config = manual_config().with_heartbeat_interval(Duration::from_secs(1));
    let client = RealtimeClient::new(config, connector);
    client.connect().await.unwrap();
    let mut server = handle.next_server().await;

    let connected_at = Instant::now();
    let ping = server.next_frame().await;
    assert!(matches!(ping, ClientFrame::Ping { .. }));
    assert_eq!(connected_at.elapsed(), Duration::from_secs(1));
    assert_eq!(client.state().latency, None);

    tokio::time::sleep(Duration::from_millis(50)).await;
    server.push(ServerFrame::Pong { timestamp: None });
    settle().await;
    assert_eq!(client.state().latency, Some(Duration::from_millis(50)));
    assert_eq!(client.stats().latency, Some(Duration::from_millis(50)));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_stops_after_disconnect() {
    let (connector, mut handle) = MockConnector::new();
    let config = manual_config().with_heartbeat_interval(Duration::from_secs(1));
    let client = RealtimeClient::new(config, connector);
    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    assert!(matches!(server.next_frame().await, ClientFrame::Ping { .. }));

    client.disconnect();
    assert!(!client.state().heartbeat_active);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(server.frames().is_empty());
    assert!(server.is_closed());
}

// ════════════════════════════════════════════════════════════════════
// Destroy
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn destroy_during_reconnection_stops_everything() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let disconnects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disconnects);
    client.on_disconnect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    client.connect().await.unwrap();
    let mut server = handle.next_server().await;
    server.close();
    settle().await;
    assert!(client.is_reconnecting());
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);

    client.destroy();
    tokio::time::sleep(Duration::from_secs(300)).await;

    assert_eq!(handle.attempt_count(), 1);
    assert!(handle.try_next_server().is_none());
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert!(!client.join_room("late"));
    client.subscribe_to_progress("late", |_| {});
    assert_eq!(client.unsubscribe_from_progress("late", None), 0);
    assert!(client.state().joined_rooms.is_empty());
    assert!(matches!(
        client.connect().await,
        Err(RealtimeError::Destroyed)
    ));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_client_closes_the_transport() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    client.connect().await.unwrap();
    let server = handle.next_server().await;

    drop(client);
    settle().await;
    assert!(server.is_closed());
}

#[tokio::test(start_paused = true)]
async fn remove_observer_stops_notifications() {
    let (connector, mut handle) = MockConnector::new();
    let client = RealtimeClient::new(manual_config(), connector);
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let id = client.on_connect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(client.remove_observer(id));
    assert!(!client.remove_observer(id));
    client.connect().await.unwrap();
    let _server = handle.next_server().await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
