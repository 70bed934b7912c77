//! Reconnect timing and frame dispatch of the connection manager, driven by a
//! scripted transport on Tokio's paused clock.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use parlor_core::ConnectionEvent;
use parlor_core::ConnectionManager;
use parlor_core::ConnectionState;
use parlor_core::InboundFrame;
use parlor_core::InstanceInfo;
use parlor_test_support::ScriptedConnection;
use parlor_test_support::ScriptedTransport;
use parlor_test_support::chat_frame;
use parlor_test_support::connection_info_frame;
use parlor_test_support::msg;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use url::Url;

const DELAY: Duration = Duration::from_millis(1_000);

fn push_url() -> Url {
    Url::parse("ws://chat.test/api/v2/ws/alice").unwrap()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn every_drop_is_followed_by_one_reconnect_after_the_fixed_delay() {
    const DROPS: usize = 6;
    let transport = ScriptedTransport::new(vec![ScriptedConnection::Deliver(Vec::new()); DROPS]);
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let handle = ConnectionManager::spawn(transport.clone(), push_url(), DELAY, events_tx);

    transport.wait_for_attempts(DROPS + 1).await;
    let times = transport.attempt_times();
    assert_eq!(times.len(), DROPS + 1);
    for pair in times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= DELAY, "reconnected after {gap:?}");
        assert!(gap < DELAY + Duration::from_millis(50), "no backoff growth: {gap:?}");
    }

    // The last channel stays open, so nothing else should be attempted.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.attempt_count(), DROPS + 1);
    assert_eq!(handle.state(), ConnectionState::Connected);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn single_close_rearms_the_timer_exactly_once() {
    let transport = ScriptedTransport::new([ScriptedConnection::Deliver(Vec::new())]);
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let handle = ConnectionManager::spawn(transport.clone(), push_url(), DELAY, events_tx);

    transport.wait_for_attempts(1).await;
    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(transport.attempt_count(), 1, "reconnected before the delay");

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(transport.attempt_count(), 2, "exactly one reconnect after the delay");

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.attempt_count(), 2);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_handshakes_cycle_through_disconnected() {
    let transport = ScriptedTransport::new([
        ScriptedConnection::Refuse,
        ScriptedConnection::Refuse,
        ScriptedConnection::Hold(Vec::new()),
    ]);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = ConnectionManager::spawn(transport.clone(), push_url(), DELAY, events_tx);

    transport.wait_for_attempts(3).await;
    tokio::task::yield_now().await;

    use ConnectionState::*;
    let states: Vec<_> = drain(&mut events_rx)
        .into_iter()
        .filter_map(|event| match event {
            ConnectionEvent::StateChanged(state) => Some(state),
            ConnectionEvent::Frame(_) => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            Connecting,
            Disconnected,
            Connecting,
            Disconnected,
            Connecting,
            Connected
        ]
    );
    let times = transport.attempt_times();
    assert!(times[1] - times[0] >= DELAY);
    assert!(times[2] - times[1] >= DELAY);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn frames_are_decoded_and_malformed_ones_dropped() {
    let transport = ScriptedTransport::new([ScriptedConnection::Hold(vec![
        connection_info_frame("i-0abc", "us-east-1a"),
        "not json at all".to_string(),
        r#"{"username":"bob"}"#.to_string(),
        chat_frame("bob", "hi", "t1"),
    ])]);
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let handle = ConnectionManager::spawn(transport.clone(), push_url(), DELAY, events_tx);

    let mut frames = Vec::new();
    while frames.len() < 2 {
        match events_rx.recv().await.expect("manager stopped") {
            ConnectionEvent::Frame(frame) => frames.push(frame),
            ConnectionEvent::StateChanged(_) => {}
        }
    }
    assert_eq!(
        frames,
        vec![
            InboundFrame::ConnectionInfo(InstanceInfo {
                instance_id: "i-0abc".to_string(),
                availability_zone: "us-east-1a".to_string(),
            }),
            InboundFrame::Chat(msg("bob", "hi", "t1")),
        ]
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(
        drain(&mut events_rx)
            .iter()
            .all(|event| !matches!(event, ConnectionEvent::Frame(_)))
    );
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_a_pending_reconnect() {
    let transport = ScriptedTransport::new([ScriptedConnection::Deliver(Vec::new())]);
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let handle = ConnectionManager::spawn(transport.clone(), push_url(), DELAY, events_tx);

    let mut state = handle.subscribe_state();
    transport.wait_for_attempts(1).await;
    state
        .wait_for(|s| *s == ConnectionState::Disconnected)
        .await
        .expect("state channel open");

    handle.shutdown().await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn manager_stops_when_nobody_listens() {
    let transport = ScriptedTransport::new([ScriptedConnection::Deliver(vec![chat_frame(
        "bob", "hi", "t1",
    )])]);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    drop(events_rx);
    let handle = ConnectionManager::spawn(transport.clone(), push_url(), DELAY, events_tx);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.attempt_count(), 0);
    assert_eq!(handle.state(), ConnectionState::Disconnected);
}
