//! One joined (or joining) topic.

use std::collections::HashSet;

use super::{ConnectionId, Topic};
use crate::protocol::MessageRef;

/// Join progress of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStatus {
    /// `phx_join` sent, no reply yet.
    Pending,
    /// Server acknowledged the join.
    Joined,
}

/// Leave progress of a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveState {
    /// The host has not asked to leave.
    NotRequested,
    /// Leave was requested while the join was pending; it is issued once the
    /// join settles.
    Deferred,
    /// `phx_leave` sent with this ref, awaiting the reply.
    InFlight(MessageRef),
}

/// Client-side record of one topic subscription.
#[derive(Debug, Clone)]
pub struct ChannelSubscription {
    /// Subscribed topic.
    pub topic: Topic,
    /// Join progress.
    pub status: JoinStatus,
    /// Events the server declared for this topic at join time.
    pub events: HashSet<String>,
    /// Ref of the `phx_join` push; carried by every later push on the topic.
    pub join_ref: MessageRef,
    /// Connection this subscription was created on.
    pub connection: ConnectionId,
    /// Leave progress.
    pub leave: LeaveState,
}

impl ChannelSubscription {
    /// Creates a pending subscription.
    #[must_use]
    pub fn pending(topic: Topic, join_ref: MessageRef, connection: ConnectionId) -> Self {
        Self {
            topic,
            status: JoinStatus::Pending,
            events: HashSet::new(),
            join_ref,
            connection,
            leave: LeaveState::NotRequested,
        }
    }

    /// Returns `true` once the join is acknowledged and no leave has been
    /// requested. Only such subscriptions receive messages and presence.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == JoinStatus::Joined && self.leave == LeaveState::NotRequested
    }

    /// Returns `true` if the host asked to leave this topic.
    #[must_use]
    pub fn is_leaving(&self) -> bool {
        self.leave != LeaveState::NotRequested
    }

    /// Returns `true` if `event` is in the declared event set.
    #[must_use]
    pub fn recognizes(&self, event: &str) -> bool {
        self.events.contains(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub() -> ChannelSubscription {
        ChannelSubscription::pending(
            Topic::from("room:1"),
            MessageRef::from("1"),
            ConnectionId::new(),
        )
    }

    #[test]
    fn pending_is_not_active() {
        let s = sub();
        assert!(!s.is_active());
        assert!(!s.is_leaving());
    }

    #[test]
    fn leaving_joined_is_not_active() {
        let mut s = sub();
        s.status = JoinStatus::Joined;
        assert!(s.is_active());
        s.leave = LeaveState::InFlight(MessageRef::from("2"));
        assert!(!s.is_active());
        assert!(s.is_leaving());
    }

    #[test]
    fn recognizes_declared_events_only() {
        let mut s = sub();
        s.events.insert("chat".to_string());
        assert!(s.recognizes("chat"));
        assert!(!s.recognizes("foo"));
    }
}
