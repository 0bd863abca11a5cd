//! Frame codec and message references.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HEARTBEAT_TOPIC, events};
use crate::domain::Topic;
use crate::error::MuxError;

/// Correlation reference carried in the `ref` and `join_ref` slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(String);

impl MessageRef {
    /// Returns the reference as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for MessageRef {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Per-connection source of fresh [`MessageRef`]s, starting at `"1"`.
#[derive(Debug)]
pub struct RefCounter {
    next: u64,
}

impl RefCounter {
    /// Creates a counter whose first ref is `"1"`.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next ref.
    pub fn next_ref(&mut self) -> MessageRef {
        let current = self.next;
        self.next = self.next.wrapping_add(1);
        MessageRef::from(current)
    }
}

impl Default for RefCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Array form used on the wire.
#[derive(Serialize, Deserialize)]
struct WireFrame(
    Option<MessageRef>,
    Option<MessageRef>,
    String,
    String,
    Value,
);

/// One protocol frame in either direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Ref of the join that owns this frame's channel.
    pub join_ref: Option<MessageRef>,
    /// Request ref; present on requests and their replies.
    pub msg_ref: Option<MessageRef>,
    /// Topic name.
    pub topic: Topic,
    /// Event name.
    pub event: String,
    /// Event payload.
    pub payload: Value,
}

impl Frame {
    /// `phx_join` request; its ref doubles as the channel's join ref.
    #[must_use]
    pub fn join(topic: Topic, join_ref: MessageRef) -> Self {
        Self {
            join_ref: Some(join_ref.clone()),
            msg_ref: Some(join_ref),
            topic,
            event: events::JOIN.to_string(),
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// `phx_leave` request.
    #[must_use]
    pub fn leave(topic: Topic, join_ref: MessageRef, msg_ref: MessageRef) -> Self {
        Self {
            join_ref: Some(join_ref),
            msg_ref: Some(msg_ref),
            topic,
            event: events::LEAVE.to_string(),
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// Application push on a joined channel.
    #[must_use]
    pub fn push(
        topic: Topic,
        event: impl Into<String>,
        payload: Value,
        join_ref: MessageRef,
        msg_ref: MessageRef,
    ) -> Self {
        Self {
            join_ref: Some(join_ref),
            msg_ref: Some(msg_ref),
            topic,
            event: event.into(),
            payload,
        }
    }

    /// Socket-level heartbeat.
    #[must_use]
    pub fn heartbeat(msg_ref: MessageRef) -> Self {
        Self {
            join_ref: None,
            msg_ref: Some(msg_ref),
            topic: Topic::from(HEARTBEAT_TOPIC),
            event: events::HEARTBEAT.to_string(),
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::MalformedFrame`] if the text is not a five
    /// element array of the expected types.
    pub fn decode(text: &str) -> Result<Self, MuxError> {
        let WireFrame(join_ref, msg_ref, topic, event, payload) =
            serde_json::from_str(text).map_err(|e| MuxError::MalformedFrame(e.to_string()))?;
        Ok(Self {
            join_ref,
            msg_ref,
            topic: Topic::from(topic),
            event,
            payload,
        })
    }

    /// Encodes the frame as text.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::MalformedFrame`] if the payload cannot be
    /// serialized.
    pub fn encode(&self) -> Result<String, MuxError> {
        let wire = WireFrame(
            self.join_ref.clone(),
            self.msg_ref.clone(),
            self.topic.as_str().to_string(),
            self.event.clone(),
            self.payload.clone(),
        );
        serde_json::to_string(&wire).map_err(|e| MuxError::MalformedFrame(e.to_string()))
    }
}
