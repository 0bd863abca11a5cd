//! Multiplexer error types with stable numeric codes.
//!
//! [`MuxError`] is the central error type for the crate. Transport and
//! protocol failures are never fatal to the process: the connection manager
//! normalizes every variant into a [`crate::domain::HostEvent`], so the enum
//! is `Clone` and carries owned, printable context only.

use serde_json::Value;

use crate::domain::Topic;

/// Multiplexer error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category          | Effect on subscription state      |
/// |-----------|-------------------|-----------------------------------|
/// | 1000–1999 | Command misuse    | none, command ignored             |
/// | 2000–2999 | Channel outcome   | join failures discard the topic   |
/// | 3000–3999 | Transport         | full teardown                     |
/// | 4000–4999 | Local             | none                              |
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MuxError {
    /// Join requested for a topic that is already joined or pending.
    #[error("duplicate join for topic {0}")]
    DuplicateJoin(Topic),

    /// Send or leave requested for a topic with no subscription.
    #[error("no subscription for topic {0}")]
    UnknownTopicOperation(Topic),

    /// Join, leave or send issued while the socket is not connected.
    #[error("socket is not connected")]
    NotConnected,

    /// The server replied `error` to a join.
    #[error("join rejected for topic {topic}: {response}")]
    JoinRejected {
        /// Topic whose join was rejected.
        topic: Topic,
        /// Server-supplied response body.
        response: Value,
    },

    /// No join reply arrived within the push timeout.
    #[error("join timed out for topic {0}")]
    JoinTimedOut(Topic),

    /// The server replied `error` to a push.
    #[error("push {event} on {topic} failed: {response}")]
    SendFailed {
        /// Topic the push was sent on.
        topic: Topic,
        /// Event name of the push.
        event: String,
        /// Server-supplied response body.
        response: Value,
    },

    /// No push reply arrived within the push timeout.
    #[error("push {event} on {topic} timed out")]
    SendTimedOut {
        /// Topic the push was sent on.
        topic: Topic,
        /// Event name of the push.
        event: String,
    },

    /// The transport reported closure.
    #[error("transport closed")]
    TransportClosed,

    /// The transport failed to open or to write a frame.
    #[error("transport error: {0}")]
    Transport(String),

    /// Opening the transport exceeded the connect timeout.
    #[error("connect timed out after {0} ms")]
    ConnectTimedOut(u64),

    /// An inbound frame could not be decoded.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The connection manager task is gone; the client handle is unusable.
    #[error("client closed")]
    ClientClosed,

    /// Key/value store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration value could not be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MuxError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::DuplicateJoin(_) => 1001,
            Self::UnknownTopicOperation(_) => 1002,
            Self::NotConnected => 1003,
            Self::JoinRejected { .. } => 2001,
            Self::JoinTimedOut(_) => 2002,
            Self::SendFailed { .. } => 2003,
            Self::SendTimedOut { .. } => 2004,
            Self::TransportClosed => 3001,
            Self::Transport(_) => 3002,
            Self::ConnectTimedOut(_) => 3003,
            Self::MalformedFrame(_) => 3004,
            Self::ClientClosed => 4001,
            Self::Storage(_) => 4002,
            Self::InvalidConfig(_) => 4003,
        }
    }

    /// Returns `true` if this error discards the subscription it concerns.
    #[must_use]
    pub const fn is_fatal_to_subscription(&self) -> bool {
        matches!(
            self,
            Self::JoinRejected { .. } | Self::JoinTimedOut(_) | Self::TransportClosed
        )
    }
}
