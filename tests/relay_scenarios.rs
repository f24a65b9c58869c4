//! End-to-end routing scenarios driven through the event router

use std::sync::Arc;

use alert_relay::incident::{AlertType, MemoryIncidentLog};
use alert_relay::protocol::OutboundMessage;
use alert_relay::registry::{ClientHandle, ClientIdentity, OutboundFrame};
use alert_relay::{EventRouter, InboundEvent, RelayState};
use serde_json::{json, Value};
use tokio::sync::mpsc;

fn router() -> Arc<EventRouter<MemoryIncidentLog>> {
    Arc::new(EventRouter::new(RelayState::new(), MemoryIncidentLog::new()))
}

fn event(name: &str, data: Value) -> InboundEvent {
    InboundEvent::from_parts(name, data).unwrap()
}

fn drain(rx: &mut mpsc::Receiver<OutboundFrame>) -> Vec<OutboundMessage> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        out.push(OutboundMessage::decode(&frame).unwrap());
    }
    out
}

fn id(s: &str) -> ClientIdentity {
    ClientIdentity::new(s)
}

#[tokio::test]
async fn later_registration_owns_identity() {
    let router = router();
    let (h1, _rx1) = ClientHandle::channel(1, 8);
    let (h2, _rx2) = ClientHandle::channel(2, 8);

    router.handle(&h1, event("connect_user", json!({"user_id": "u1"}))).await;
    router.handle(&h2, event("connect_user", json!({"user_id": "u1"}))).await;

    let owner = router.state().sessions.lookup(&id("u1")).await.unwrap();
    assert_eq!(owner.id(), h2.id());
}

#[tokio::test]
async fn disconnect_forgets_identities_of_handle() {
    let router = router();
    let (h, _rx) = ClientHandle::channel(1, 8);

    router.handle(&h, event("connect_user", json!({"user_id": "u1"}))).await;
    router.handle(&h, event("connect_user", json!({"user_id": "u2"}))).await;

    let mut held = router.state().sessions.identities_of(&h).await;
    held.sort();
    assert_eq!(held, vec![id("u1"), id("u2")]);

    router.disconnect(&h).await;
    assert!(router.state().sessions.identities_of(&h).await.is_empty());

    assert!(router.state().sessions.lookup(&id("u1")).await.is_none());
    assert!(router.state().sessions.lookup(&id("u2")).await.is_none());
}

#[tokio::test]
async fn subscribe_then_stream_preserves_order() {
    let router = router();
    let (monitor, mut monitor_rx) = ClientHandle::channel(1, 16);
    let (field, _field_rx) = ClientHandle::channel(2, 16);

    router.handle(&monitor, event("connect_admin", Value::Null)).await;
    router.handle(&monitor, event("request_listen", json!({"user_id": "u1"}))).await;
    assert_eq!(
        drain(&mut monitor_rx),
        vec![OutboundMessage::ListenConfirm { room: id("u1") }]
    );

    router.handle(&field, event("connect_user", json!({"user_id": "u1"}))).await;
    for chunk in ["c1", "c2", "c3"] {
        router
            .handle(&field, event("audio_chunk", json!({"user_id": "u1", "chunk": chunk})))
            .await;
    }

    let received = drain(&mut monitor_rx);
    let expected: Vec<OutboundMessage> = ["c1", "c2", "c3"]
        .into_iter()
        .map(|c| OutboundMessage::AudioChunk {
            user_id: id("u1"),
            chunk: json!(c),
        })
        .collect();
    assert_eq!(received, expected);
}

#[tokio::test]
async fn monitor_disconnect_stops_delivery_for_all_rooms() {
    let router = router();
    let (monitor, mut monitor_rx) = ClientHandle::channel(1, 16);
    let (field, _field_rx) = ClientHandle::channel(2, 16);

    router.handle(&monitor, event("request_listen", json!({"user_id": "u1"}))).await;
    router.handle(&monitor, event("request_listen", json!({"user_id": "u2"}))).await;
    drain(&mut monitor_rx);

    router.disconnect(&monitor).await;

    let mut queued = 0;
    for user in ["u1", "u2"] {
        queued += router
            .handle(&field, event("audio_chunk", json!({"user_id": user, "chunk": "x"})))
            .await;
    }

    assert_eq!(queued, 0);
    assert!(drain(&mut monitor_rx).is_empty());
    assert_eq!(router.state().rooms.room_count().await, 0);
}

#[tokio::test]
async fn panic_reaches_notifier_exactly_once() {
    let router = router();
    let (field, _rx) = ClientHandle::channel(1, 8);

    router.handle(&field, event("connect_user", json!({"user_id": "u1"}))).await;
    router
        .handle(&field, event("panic", json!({"user_id": "u1", "level": "High"})))
        .await;

    let records = router.notifier().records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].client_identity, id("u1"));
    assert_eq!(records[0].alert_type, AlertType::Panic);
    assert_eq!(records[0].severity_level, "High");
    assert!(!records[0].auto_dispatch);
}

#[tokio::test]
async fn malformed_audio_does_not_affect_other_traffic() {
    let router = router();
    let (monitor, mut monitor_rx) = ClientHandle::channel(1, 16);
    let (field, _field_rx) = ClientHandle::channel(2, 16);

    router.handle(&monitor, event("request_listen", json!({"user_id": "u1"}))).await;
    drain(&mut monitor_rx);

    router
        .handle(&field, event("audio_chunk", json!({"user_id": "u1"})))
        .await;
    router
        .handle(&field, event("audio_chunk", json!({"user_id": "u1", "chunk": "ok"})))
        .await;

    assert_eq!(
        drain(&mut monitor_rx),
        vec![OutboundMessage::AudioChunk {
            user_id: id("u1"),
            chunk: json!("ok"),
        }]
    );
}

#[tokio::test]
async fn concurrent_subscribe_and_disconnect_leave_no_dangling_member() {
    let router = router();

    let mut tasks = Vec::new();
    for n in 0..64u64 {
        let router = Arc::clone(&router);
        tasks.push(tokio::spawn(async move {
            let (monitor, _rx) = ClientHandle::channel(n, 4);
            let sub = {
                let router = Arc::clone(&router);
                let monitor = Arc::clone(&monitor);
                tokio::spawn(async move {
                    router
                        .handle(&monitor, event("request_listen", json!({"user_id": "u1"})))
                        .await;
                })
            };
            router.disconnect(&monitor).await;
            tokio_test::assert_ok!(sub.await);
        }));
    }
    for task in tasks {
        tokio_test::assert_ok!(task.await);
    }

    assert!(router.state().rooms.members_of(&id("u1")).await.is_empty());
    assert_eq!(router.state().rooms.room_count().await, 0);
}

#[tokio::test]
async fn stats_snapshot_reflects_registry() {
    let router = router();
    let (field, _frx) = ClientHandle::channel(1, 8);
    let (monitor, _mrx) = ClientHandle::channel(2, 8);

    router.handle(&field, event("connect_user", json!({"user_id": "u1"}))).await;
    router.handle(&monitor, event("connect_admin", Value::Null)).await;
    router.handle(&monitor, event("request_listen", json!({"user_id": "u1"}))).await;

    let snapshot = router.state().snapshot().await;
    assert_eq!(snapshot.field_clients, 1);
    assert_eq!(snapshot.monitors, 1);
    assert_eq!(snapshot.rooms, 1);
    assert_eq!(snapshot.events_received, 3);
}
