//! End-to-end behaviour of the bridge with recording store/publisher fakes.

use aquafeed_bridge::domain::SensorKind;
use aquafeed_bridge::registry::ClientConnection;
use aquafeed_bridge::test_utils::{test_bridge, test_bridge_with, RecordingStore};

use serde_json::{json, Value};
use std::time::Duration;

fn next_frame(conn: &mut ClientConnection) -> Option<Value> {
    conn.outbox
        .try_recv()
        .ok()
        .map(|frame| serde_json::from_str(&frame).unwrap())
}

const VALID: &[u8] = br#"{"temperature": 26.1, "pH": 7.4, "turbidity": 12.0}"#;

#[tokio::test]
async fn test_valid_sensor_message_updates_persists_and_broadcasts() {
    let (bridge, store, _) = test_bridge();
    let mut client = bridge.on_client_connect().await;

    assert!(bridge.on_sensor_message(VALID).await);
    bridge.flush_persistence().await;

    let snap = bridge.state().snapshot().await;
    assert_eq!(snap.temperature, Some(26.1));
    assert_eq!(snap.ph, Some(7.4));
    assert_eq!(snap.turbidity, Some(12.0));

    let attempts = store.attempts();
    let kinds: Vec<_> = attempts.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, SensorKind::ALL);
    assert_eq!(attempts[0].value, 26.1);
    assert_eq!(attempts[1].value, 7.4);
    assert_eq!(attempts[2].value, 12.0);
    assert!(attempts.iter().all(|r| r.date == attempts[0].date && r.time == attempts[0].time));

    assert_eq!(
        next_frame(&mut client),
        Some(json!({"type": "sensor", "data": {"temperature": 26.1, "pH": 7.4, "turbidity": 12.0}}))
    );
    assert_eq!(next_frame(&mut client), None);
}

#[tokio::test]
async fn test_incomplete_sensor_message_changes_nothing() {
    let (bridge, store, _) = test_bridge();
    assert!(bridge.on_sensor_message(VALID).await);
    bridge.flush_persistence().await;
    let mut client = bridge.on_client_connect().await;
    next_frame(&mut client);

    for body in [
        r#"{"temperature": 30.0, "pH": 6.0}"#,
        r#"{"pH": 6.0, "turbidity": 1.0}"#,
        r#"{"temperature": 30.0, "pH": "acidic", "turbidity": 1.0}"#,
        r#"not json"#,
    ] {
        assert!(!bridge.on_sensor_message(body.as_bytes()).await, "{body}");
    }
    bridge.flush_persistence().await;

    let snap = bridge.state().snapshot().await;
    assert_eq!(snap.temperature, Some(26.1));
    assert_eq!(snap.ph, Some(7.4));
    assert_eq!(snap.turbidity, Some(12.0));
    assert_eq!(store.attempts().len(), 3);
    assert_eq!(next_frame(&mut client), None);
}

#[tokio::test]
async fn test_one_kind_failing_to_persist_blocks_nothing_else() {
    let (bridge, store, _) = test_bridge();
    store.fail_on(SensorKind::Temperature);
    let mut client = bridge.on_client_connect().await;

    assert!(bridge.on_sensor_message(VALID).await);
    bridge.flush_persistence().await;

    assert_eq!(store.attempts().len(), 3);
    assert_eq!(bridge.state().snapshot().await.temperature, Some(26.1));
    assert!(next_frame(&mut client).is_some());
}

#[tokio::test]
async fn test_rows_keep_arrival_order_when_an_insert_is_slow() {
    let store = RecordingStore::new();
    store.delay_on(1.0, Duration::from_millis(100));
    let (bridge, store, _) = test_bridge_with(store);

    assert!(bridge.on_sensor_message(br#"{"temperature": 1, "pH": 1, "turbidity": 1}"#).await);
    assert!(bridge.on_sensor_message(br#"{"temperature": 2, "pH": 2, "turbidity": 2}"#).await);
    // the cache never waits on the store
    assert_eq!(bridge.state().snapshot().await.temperature, Some(2.0));

    bridge.flush_persistence().await;
    let values: Vec<f64> = store.attempts().iter().map(|r| r.value).collect();
    assert_eq!(values, [1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
}

#[tokio::test]
async fn test_new_client_gets_current_snapshot_first() {
    let (bridge, _, _) = test_bridge();
    assert!(bridge.on_sensor_message(VALID).await);
    bridge.flush_persistence().await;

    let mut client = bridge.on_client_connect().await;
    assert!(
        bridge
            .on_sensor_message(br#"{"temperature": 27, "pH": 7.0, "turbidity": 11}"#)
            .await
    );

    assert_eq!(
        next_frame(&mut client),
        Some(json!({"type": "sensor", "data": {"temperature": 26.1, "pH": 7.4, "turbidity": 12.0}}))
    );
    assert_eq!(
        next_frame(&mut client),
        Some(json!({"type": "sensor", "data": {"temperature": 27.0, "pH": 7.0, "turbidity": 11.0}}))
    );
}

#[tokio::test]
async fn test_new_client_with_empty_cache_gets_nothing() {
    let (bridge, _, _) = test_bridge();
    let mut client = bridge.on_client_connect().await;
    assert_eq!(next_frame(&mut client), None);
}

#[tokio::test]
async fn test_disconnected_client_misses_broadcast() {
    let (bridge, _, _) = test_bridge();
    let mut stays = bridge.on_client_connect().await;
    let mut leaves = bridge.on_client_connect().await;
    bridge.on_client_disconnect(leaves.id).await;

    assert!(bridge.on_sensor_message(VALID).await);

    assert!(next_frame(&mut stays).is_some());
    assert_eq!(next_frame(&mut leaves), None);
    assert_eq!(bridge.clients().len().await, 1);
}

#[tokio::test]
async fn test_closed_socket_does_not_break_broadcast() {
    let (bridge, _, _) = test_bridge();
    let closed = bridge.on_client_connect().await;
    let mut open = bridge.on_client_connect().await;
    drop(closed.outbox);

    assert!(bridge.on_sensor_message(VALID).await);
    assert!(next_frame(&mut open).is_some());
}

#[tokio::test]
async fn test_instant_feed_publishes_and_replies_to_sender_only() {
    let (bridge, _, publisher) = test_bridge();
    let mut sender = bridge.on_client_connect().await;
    let mut other = bridge.on_client_connect().await;

    bridge
        .on_client_message(sender.id, br#"{"feed_now": true, "quantity": 5}"#)
        .await;

    assert_eq!(publisher.published(), vec![json!({"feed_now": true, "quantity": 5})]);
    assert_eq!(
        next_frame(&mut sender),
        Some(json!({"status": "success", "message": "Instant feeding triggered"}))
    );
    assert_eq!(next_frame(&mut other), None);
    // instant feeds never touch the schedule slot
    assert_eq!(bridge.state().schedule().await.time, None);
}

#[tokio::test]
async fn test_schedule_overwrites_publishes_and_replies() {
    let (bridge, _, publisher) = test_bridge();
    let mut sender = bridge.on_client_connect().await;
    let mut other = bridge.on_client_connect().await;

    bridge
        .on_client_message(sender.id, br#"{"time": "08:00", "quantity": 10}"#)
        .await;
    bridge
        .on_client_message(sender.id, br#"{"time": "19:45", "quantity": 3}"#)
        .await;

    let schedule = bridge.state().schedule().await;
    assert_eq!(
        serde_json::to_value(&schedule).unwrap(),
        json!({"time": "19:45", "quantity": 3})
    );
    assert_eq!(
        publisher.published(),
        vec![
            json!({"time": "08:00", "quantity": 10}),
            json!({"time": "19:45", "quantity": 3}),
        ]
    );
    let reply = json!({"status": "success", "message": "Feeding schedule received successfully"});
    assert_eq!(next_frame(&mut sender), Some(reply.clone()));
    assert_eq!(next_frame(&mut sender), Some(reply));
    assert_eq!(next_frame(&mut other), None);
}

#[tokio::test]
async fn test_unrecognized_and_malformed_commands_are_ignored() {
    let (bridge, _, publisher) = test_bridge();
    let mut sender = bridge.on_client_connect().await;

    for body in [
        r#"{"quantity": 5}"#,
        r#"{"feed_now": true}"#,
        r#"{"time": "08:00"}"#,
        r#"{"hello": "world"}"#,
        r#"{"feed_now": true, "quantity": 0}"#,
        r#"{{{"#,
    ] {
        bridge.on_client_message(sender.id, body.as_bytes()).await;
    }

    assert!(publisher.published().is_empty());
    assert_eq!(next_frame(&mut sender), None);
    assert_eq!(bridge.state().schedule().await.time, None);
    // connection stays registered
    assert_eq!(bridge.clients().len().await, 1);
}

#[tokio::test]
async fn test_publish_failure_still_replies() {
    let (bridge, _, publisher) = test_bridge();
    publisher.set_failing(true);
    let mut sender = bridge.on_client_connect().await;

    bridge
        .on_client_message(sender.id, br#"{"feed_now": true, "quantity": 2}"#)
        .await;

    assert!(publisher.published().is_empty());
    assert!(next_frame(&mut sender).is_some());
}
