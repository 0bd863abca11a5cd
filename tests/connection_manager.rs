//! End-to-end tests of the connection manager over the in-memory transport.
//!
//! Each test scripts the server side of a V2 channel socket by hand.

#![allow(clippy::panic)]

use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use topic_mux::config::MuxConfig;
use topic_mux::domain::{ConnectionState, HostEvent, Topic};
use topic_mux::error::MuxError;
use topic_mux::protocol::{Frame, MessageRef, events};
use topic_mux::session::MuxClient;
use topic_mux::transport::memory::{MemoryConnector, MemoryServer};

const WAIT: Duration = Duration::from_secs(2);

fn config() -> MuxConfig {
    MuxConfig::default()
        .with_push_timeout(Duration::from_millis(100))
        .with_connect_timeout(Duration::from_millis(200))
        .with_heartbeat_interval(None)
}

struct Harness {
    client: MuxClient,
    events: UnboundedReceiver<HostEvent>,
    server: MemoryServer,
    connector: MemoryConnector,
}

impl Harness {
    async fn connected(config: MuxConfig) -> Self {
        let connector = MemoryConnector::new();
        let server = connector.accept_next().await;
        let (client, events) = MuxClient::start(connector.clone(), &config);
        let mut harness = Self {
            client,
            events,
            server,
            connector,
        };
        assert!(harness.client.connect("tok").is_ok());
        assert_eq!(harness.next_event().await, HostEvent::SocketOpened);
        harness
    }

    async fn next_event(&mut self) -> HostEvent {
        match timeout(WAIT, self.events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => panic!("event stream ended"),
            Err(_) => panic!("no host event within {WAIT:?}"),
        }
    }

    async fn next_frame(&mut self) -> Frame {
        match timeout(WAIT, self.server.recv_frame()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => panic!("client closed the transport"),
            Err(_) => panic!("no frame within {WAIT:?}"),
        }
    }

    /// Joins `topic` and acknowledges with `declared` events.
    async fn join(&mut self, topic: &str, declared: &[&str]) -> MessageRef {
        assert!(self.client.join_topic(topic).is_ok());
        let frame = self.next_frame().await;
        assert_eq!(frame.event, events::JOIN);
        let Some(join_ref) = frame.join_ref.clone() else {
            panic!("join without join_ref");
        };
        self.reply(&frame, "ok", json!({ "events": declared }));
        assert_eq!(
            self.next_event().await,
            HostEvent::TopicJoined {
                topic: Topic::from(topic)
            }
        );
        join_ref
    }

    fn reply(&self, request: &Frame, status: &str, response: Value) {
        let reply = Frame {
            join_ref: request.join_ref.clone(),
            msg_ref: request.msg_ref.clone(),
            topic: request.topic.clone(),
            event: events::REPLY.to_string(),
            payload: json!({ "status": status, "response": response }),
        };
        assert!(self.server.send_frame(&reply));
    }

    fn push(&self, join_ref: &MessageRef, topic: &str, event: &str, payload: Value) {
        let frame = Frame {
            join_ref: Some(join_ref.clone()),
            msg_ref: None,
            topic: Topic::from(topic),
            event: event.to_string(),
            payload,
        };
        assert!(self.server.send_frame(&frame));
    }
}

fn message(event: &HostEvent) -> (&str, &str, &Value) {
    let HostEvent::MessageReceived(envelope) = event else {
        panic!("expected MessageReceived, got {event:?}");
    };
    (
        envelope.topic.as_str(),
        envelope.event.as_str(),
        &envelope.payload,
    )
}

#[tokio::test]
async fn end_to_end_join_and_filtered_delivery() {
    let mut h = Harness::connected(config()).await;
    assert_eq!(h.connector.tokens().await, vec!["tok"]);

    let join_ref = h.join("room:1", &["chat"]).await;
    h.push(&join_ref, "room:1", "chat", json!("hi"));
    h.push(&join_ref, "room:1", "unknown", json!({}));
    h.push(&join_ref, "room:1", "chat", json!("bye"));

    let first = h.next_event().await;
    assert_eq!(message(&first), ("room:1", "chat", &json!("hi")));
    let second = h.next_event().await;
    assert_eq!(message(&second), ("room:1", "chat", &json!("bye")));
}

#[tokio::test]
async fn double_join_writes_one_frame() {
    let mut h = Harness::connected(config()).await;
    assert!(h.client.join_topic("room:1").is_ok());
    assert!(h.client.join_topic("room:1").is_ok());

    let frame = h.next_frame().await;
    assert_eq!(frame.event, events::JOIN);
    let HostEvent::CommandRejected { error } = h.next_event().await else {
        panic!("expected CommandRejected");
    };
    assert_eq!(error, MuxError::DuplicateJoin(Topic::from("room:1")));
    assert!(h.server.try_recv_frame().is_none());
}

#[tokio::test]
async fn leave_of_unknown_topic_writes_nothing() {
    let mut h = Harness::connected(config()).await;
    assert!(h.client.leave_topic("room:9").is_ok());
    let HostEvent::CommandRejected { error } = h.next_event().await else {
        panic!("expected CommandRejected");
    };
    assert_eq!(error, MuxError::UnknownTopicOperation(Topic::from("room:9")));
    assert!(h.server.try_recv_frame().is_none());
}

#[tokio::test]
async fn frames_keep_arrival_order() {
    let mut h = Harness::connected(config()).await;
    let join_ref = h.join("room:1", &["e"]).await;
    for n in 1..=3 {
        h.push(&join_ref, "room:1", "e", json!(n));
    }
    for n in 1..=3 {
        let event = h.next_event().await;
        assert_eq!(message(&event).2, &json!(n));
    }
}

#[tokio::test]
async fn transport_close_cleans_up_once() {
    let mut h = Harness::connected(config()).await;
    let lobby = h.join("room:1", &["chat"]).await;
    let _other = h.join("room:2", &["chat"]).await;
    h.push(
        &lobby,
        "room:1",
        events::PRESENCE_STATE,
        json!({"alice": {"metas": [{"phx_ref": "a1"}]}}),
    );
    let HostEvent::PresenceUpdated { state, .. } = h.next_event().await else {
        panic!("expected PresenceUpdated");
    };
    assert_eq!(state.len(), 1);

    h.server.close();
    assert_eq!(h.next_event().await, HostEvent::SocketDisconnected);
    assert_eq!(h.client.state(), ConnectionState::Disconnected);

    // Topic commands are refused until reconnect.
    assert!(h.client.send_message("room:1", "chat", json!({})).is_ok());
    assert_eq!(
        h.next_event().await,
        HostEvent::CommandRejected {
            error: MuxError::NotConnected
        }
    );

    // No per-topic events were emitted; a fresh connection starts clean.
    h.server = h.connector.accept_next().await;
    assert!(h.client.connect("tok").is_ok());
    assert_eq!(h.next_event().await, HostEvent::SocketOpened);
    let join_ref = h.join("room:1", &["chat"]).await;
    assert_eq!(join_ref, MessageRef::from("1"));
}

#[tokio::test]
async fn local_disconnect_is_idempotent() {
    let mut h = Harness::connected(config()).await;
    let _ = h.join("room:1", &["chat"]).await;
    assert!(h.client.disconnect().is_ok());
    assert!(h.client.disconnect().is_ok());
    assert_eq!(h.next_event().await, HostEvent::SocketDisconnected);

    assert!(h.client.join_topic("room:2").is_ok());
    assert_eq!(
        h.next_event().await,
        HostEvent::CommandRejected {
            error: MuxError::NotConnected
        }
    );
}

#[tokio::test]
async fn connect_while_connected_reuses_transport() {
    let mut h = Harness::connected(config()).await;
    assert!(h.client.connect("other").is_ok());
    assert_eq!(h.next_event().await, HostEvent::SocketOpened);
    assert_eq!(h.connector.tokens().await, vec!["tok"]);
}

#[tokio::test]
async fn presence_snapshot_then_diff() {
    let mut h = Harness::connected(config()).await;
    let join_ref = h.join("room:1", &[]).await;
    h.push(
        &join_ref,
        "room:1",
        events::PRESENCE_STATE,
        json!({"A": {"metas": [{"phx_ref": "m1"}]}}),
    );
    h.push(
        &join_ref,
        "room:1",
        events::PRESENCE_DIFF,
        json!({
            "joins": {"B": {"metas": [{"phx_ref": "m2"}]}},
            "leaves": {"A": {"metas": [{"phx_ref": "m1"}]}}
        }),
    );

    let HostEvent::PresenceUpdated { state, .. } = h.next_event().await else {
        panic!("expected snapshot");
    };
    assert_eq!(state.identities().collect::<Vec<_>>(), vec!["A"]);
    let HostEvent::PresenceUpdated { topic, state } = h.next_event().await else {
        panic!("expected diff result");
    };
    assert_eq!(topic, Topic::from("room:1"));
    assert_eq!(state.identities().collect::<Vec<_>>(), vec!["B"]);
    assert_eq!(state.metas("B"), Some(&[json!({"phx_ref": "m2"})][..]));
}

#[tokio::test]
async fn join_rejection_is_reported() {
    let mut h = Harness::connected(config()).await;
    assert!(h.client.join_topic("room:1").is_ok());
    let frame = h.next_frame().await;
    h.reply(&frame, "error", json!({"reason": "unauthorized"}));
    let HostEvent::JoinFailed { topic, error } = h.next_event().await else {
        panic!("expected JoinFailed");
    };
    assert_eq!(topic, Topic::from("room:1"));
    assert!(matches!(error, MuxError::JoinRejected { .. }));

    // The topic can be joined again.
    let _ = h.join("room:1", &[]).await;
}

#[tokio::test]
async fn join_timeout_is_reported() {
    let mut h = Harness::connected(config()).await;
    assert!(h.client.join_topic("room:1").is_ok());
    let _ = h.next_frame().await;
    let HostEvent::JoinFailed { error, .. } = h.next_event().await else {
        panic!("expected JoinFailed");
    };
    assert_eq!(error, MuxError::JoinTimedOut(Topic::from("room:1")));
}

#[tokio::test]
async fn leave_during_pending_join_does_not_resurrect() {
    let mut h = Harness::connected(config()).await;
    assert!(h.client.join_topic("room:1").is_ok());
    assert!(h.client.leave_topic("room:1").is_ok());
    let join = h.next_frame().await;
    h.reply(&join, "ok", json!({"events": ["chat"]}));

    let leave = h.next_frame().await;
    assert_eq!(leave.event, events::LEAVE);
    assert_eq!(leave.join_ref, join.join_ref);
    h.reply(&leave, "ok", json!({}));

    assert_eq!(
        h.next_event().await,
        HostEvent::TopicLeft {
            topic: Topic::from("room:1")
        }
    );
}

#[tokio::test]
async fn push_reply_and_timeout() {
    let mut h = Harness::connected(config()).await;
    let _ = h.join("room:1", &["chat"]).await;

    assert!(h.client.send_message("room:1", "chat", json!({"body": "hi"})).is_ok());
    let push = h.next_frame().await;
    assert_eq!(push.event, "chat");
    assert_eq!(push.payload, json!({"body": "hi"}));
    h.reply(&push, "ok", json!({"id": 7}));
    let HostEvent::PushReplied { event, response, .. } = h.next_event().await else {
        panic!("expected PushReplied");
    };
    assert_eq!(event, "chat");
    assert_eq!(response, json!({"id": 7}));

    assert!(h.client.send_message("room:1", "chat", json!({})).is_ok());
    let _ = h.next_frame().await;
    let HostEvent::PushFailed { error, .. } = h.next_event().await else {
        panic!("expected PushFailed");
    };
    assert!(matches!(error, MuxError::SendTimedOut { .. }));
    assert_eq!(h.client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn unanswered_heartbeat_tears_down() {
    let config = config().with_heartbeat_interval(Some(Duration::from_millis(50)));
    let mut h = Harness::connected(config).await;
    let beat = h.next_frame().await;
    assert_eq!(beat.topic, Topic::from("phoenix"));
    assert_eq!(beat.event, events::HEARTBEAT);
    assert_eq!(h.next_event().await, HostEvent::SocketDisconnected);
}

#[tokio::test]
async fn answered_heartbeat_keeps_connection() {
    let config = config().with_heartbeat_interval(Some(Duration::from_millis(30)));
    let mut h = Harness::connected(config).await;
    for _ in 0..3 {
        let beat = h.next_frame().await;
        h.reply(&beat, "ok", json!({}));
    }
    assert_eq!(h.client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn failed_connect_is_reported() {
    let connector = MemoryConnector::new();
    let (client, mut events) = MuxClient::start(connector.clone(), &config());
    connector
        .fail_next(MuxError::Transport("refused".to_string()))
        .await;
    assert!(client.connect("tok").is_ok());
    let Ok(Some(HostEvent::ConnectionFailed { error })) = timeout(WAIT, events.recv()).await
    else {
        panic!("expected ConnectionFailed");
    };
    assert_eq!(error.error_code(), 3002);
}

#[tokio::test]
async fn dropping_client_closes_transport() {
    let Harness {
        client, mut server, ..
    } = Harness::connected(config()).await;
    drop(client);
    let closed = timeout(WAIT, server.recv_text()).await;
    assert!(matches!(closed, Ok(None)));
}
