//! Normalized message units exchanged with the host application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Topic;

/// One inbound application event, tagged with its topic and event name.
///
/// Produced by the message router for every frame whose topic is joined and
/// whose event is in that subscription's recognized set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Topic the frame arrived on.
    pub topic: Topic,
    /// Application event name.
    pub event: String,
    /// Opaque payload.
    pub payload: Value,
    /// Local receive timestamp.
    pub received_at: DateTime<Utc>,
}

impl MessageEnvelope {
    /// Creates an envelope stamped with the current time.
    #[must_use]
    pub fn new(topic: Topic, event: impl Into<String>, payload: Value) -> Self {
        Self {
            topic,
            event: event.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}

/// One outbound push requested by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Joined topic to push on.
    pub topic: Topic,
    /// Application event name.
    pub event: String,
    /// Opaque payload.
    pub payload: Value,
    /// Whether the `ok | error | timeout` outcome is tracked and reported.
    pub expects_reply: bool,
}

impl OutboundMessage {
    /// Creates a push whose reply outcome is reported to the host.
    #[must_use]
    pub fn new(topic: impl Into<Topic>, event: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
            expects_reply: true,
        }
    }

    /// Disables reply tracking for this push.
    #[must_use]
    pub fn without_reply(mut self) -> Self {
        self.expects_reply = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_expects_reply_by_default() {
        let msg = OutboundMessage::new("room:1", "chat", serde_json::json!("hi"));
        assert!(msg.expects_reply);
        assert!(!msg.without_reply().expects_reply);
    }

    #[test]
    fn envelope_serializes_topic_as_string() {
        let env = MessageEnvelope::new(Topic::from("room:1"), "chat", serde_json::json!("hi"));
        let json = serde_json::to_value(&env).unwrap_or_default();
        assert_eq!(json["topic"], "room:1");
        assert_eq!(json["event"], "chat");
    }
}
