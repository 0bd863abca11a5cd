//! Events delivered to the host application.
//!
//! Every outcome of a host command and every relevant inbound frame is
//! normalized into a [`HostEvent`] and published through the
//! [`super::EventBus`] in the order it happened.

use serde_json::Value;

use super::{MessageEnvelope, PresenceState, Topic};
use crate::error::MuxError;

/// Normalized event for the host application.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The transport opened; join/leave/send are now accepted.
    SocketOpened,

    /// The transport closed; all subscriptions and presence were cleared.
    SocketDisconnected,

    /// Opening the transport failed. No retry is attempted.
    ConnectionFailed {
        /// Why the connection could not be opened.
        error: MuxError,
    },

    /// The server acknowledged a join.
    TopicJoined {
        /// Joined topic.
        topic: Topic,
    },

    /// A subscription ended (acknowledged leave, leave timeout, server
    /// close, or a deferred leave settling).
    TopicLeft {
        /// Left topic.
        topic: Topic,
    },

    /// A join was rejected or timed out; the subscription was discarded.
    JoinFailed {
        /// Topic that failed to join.
        topic: Topic,
        /// [`MuxError::JoinRejected`] or [`MuxError::JoinTimedOut`].
        error: MuxError,
    },

    /// An application event arrived on a joined topic.
    MessageReceived(MessageEnvelope),

    /// A topic's presence changed; carries the full resulting state.
    PresenceUpdated {
        /// Topic whose presence changed.
        topic: Topic,
        /// Complete presence state after the change.
        state: PresenceState,
    },

    /// The server replied `ok` to a push.
    PushReplied {
        /// Topic the push was sent on.
        topic: Topic,
        /// Event name of the push.
        event: String,
        /// Server-supplied response body.
        response: Value,
    },

    /// A push was answered with `error` or timed out.
    PushFailed {
        /// Topic the push was sent on.
        topic: Topic,
        /// Event name of the push.
        event: String,
        /// [`MuxError::SendFailed`] or [`MuxError::SendTimedOut`].
        error: MuxError,
    },

    /// A command was not accepted (duplicate join, unknown topic, not
    /// connected). No frame was written.
    CommandRejected {
        /// Why the command was ignored.
        error: MuxError,
    },
}

impl HostEvent {
    /// Returns the topic this event concerns, if any.
    #[must_use]
    pub fn topic(&self) -> Option<&Topic> {
        match self {
            Self::TopicJoined { topic }
            | Self::TopicLeft { topic }
            | Self::JoinFailed { topic, .. }
            | Self::PresenceUpdated { topic, .. }
            | Self::PushReplied { topic, .. }
            | Self::PushFailed { topic, .. } => Some(topic),
            Self::MessageReceived(envelope) => Some(&envelope.topic),
            Self::SocketOpened
            | Self::SocketDisconnected
            | Self::ConnectionFailed { .. }
            | Self::CommandRejected { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::SocketOpened => "socket_opened",
            Self::SocketDisconnected => "socket_disconnected",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::TopicJoined { .. } => "topic_joined",
            Self::TopicLeft { .. } => "topic_left",
            Self::JoinFailed { .. } => "join_failed",
            Self::MessageReceived(_) => "message_received",
            Self::PresenceUpdated { .. } => "presence_updated",
            Self::PushReplied { .. } => "push_replied",
            Self::PushFailed { .. } => "push_failed",
            Self::CommandRejected { .. } => "command_rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_accessor() {
        let topic = Topic::from("room:1");
        let event = HostEvent::TopicJoined {
            topic: topic.clone(),
        };
        assert_eq!(event.topic(), Some(&topic));
        assert_eq!(HostEvent::SocketOpened.topic(), None);
    }

    #[test]
    fn message_topic_comes_from_envelope() {
        let env = MessageEnvelope::new(Topic::from("room:1"), "chat", Value::Null);
        let event = HostEvent::MessageReceived(env);
        assert_eq!(event.topic(), Some(&Topic::from("room:1")));
        assert_eq!(event.event_type_str(), "message_received");
    }
}
