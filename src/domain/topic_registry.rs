//! Subscription storage enforcing one subscription per topic.
//!
//! [`TopicRegistry`] is owned by the multiplexer and mutated only from the
//! connection manager's event loop, so it needs no interior locking.

use std::collections::HashMap;

use super::subscription::{ChannelSubscription, JoinStatus, LeaveState};
use super::{ConnectionId, Topic};
use crate::error::MuxError;
use crate::protocol::MessageRef;

/// What the caller must do after [`TopicRegistry::request_leave`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveAction {
    /// The topic is joined: send `phx_leave` now.
    SendLeave,
    /// The join is still pending: leave is deferred until it settles.
    Deferred,
    /// A leave is already requested; nothing to do.
    AlreadyLeaving,
}

/// Map of topic → subscription with idempotent join/leave bookkeeping.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    subscriptions: HashMap<Topic, ChannelSubscription>,
}

impl TopicRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pending join for `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::DuplicateJoin`] if a subscription, pending or
    /// joined, already exists for the topic.
    pub fn begin_join(
        &mut self,
        topic: Topic,
        join_ref: MessageRef,
        connection: ConnectionId,
    ) -> Result<(), MuxError> {
        if self.subscriptions.contains_key(&topic) {
            return Err(MuxError::DuplicateJoin(topic));
        }
        let sub = ChannelSubscription::pending(topic.clone(), join_ref, connection);
        self.subscriptions.insert(topic, sub);
        Ok(())
    }

    /// Marks the topic joined and records its declared events.
    ///
    /// Returns the updated subscription, or `None` if the topic is unknown.
    pub fn confirm_join(
        &mut self,
        topic: &Topic,
        events: impl IntoIterator<Item = String>,
    ) -> Option<&ChannelSubscription> {
        let sub = self.subscriptions.get_mut(topic)?;
        sub.status = JoinStatus::Joined;
        sub.events = events.into_iter().collect();
        Some(sub)
    }

    /// Registers the host's intent to leave `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::UnknownTopicOperation`] if the topic has no
    /// subscription.
    pub fn request_leave(&mut self, topic: &Topic) -> Result<LeaveAction, MuxError> {
        let Some(sub) = self.subscriptions.get_mut(topic) else {
            return Err(MuxError::UnknownTopicOperation(topic.clone()));
        };
        if sub.is_leaving() {
            return Ok(LeaveAction::AlreadyLeaving);
        }
        match sub.status {
            JoinStatus::Joined => Ok(LeaveAction::SendLeave),
            JoinStatus::Pending => {
                sub.leave = LeaveState::Deferred;
                Ok(LeaveAction::Deferred)
            }
        }
    }

    /// Records that `phx_leave` was sent with `leave_ref`.
    pub fn mark_leave_sent(&mut self, topic: &Topic, leave_ref: MessageRef) {
        if let Some(sub) = self.subscriptions.get_mut(topic) {
            sub.leave = LeaveState::InFlight(leave_ref);
        }
    }

    /// Removes and returns the topic's subscription.
    pub fn remove(&mut self, topic: &Topic) -> Option<ChannelSubscription> {
        self.subscriptions.remove(topic)
    }

    /// Returns the topic's subscription.
    #[must_use]
    pub fn get(&self, topic: &Topic) -> Option<&ChannelSubscription> {
        self.subscriptions.get(topic)
    }

    /// Returns `true` if the topic has a subscription in any state.
    #[must_use]
    pub fn contains(&self, topic: &Topic) -> bool {
        self.subscriptions.contains_key(topic)
    }

    /// Returns `true` if the topic is joined and not leaving.
    #[must_use]
    pub fn is_active(&self, topic: &Topic) -> bool {
        self.subscriptions
            .get(topic)
            .is_some_and(ChannelSubscription::is_active)
    }

    /// Returns the subscribed topics in sorted order.
    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.subscriptions.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Returns the number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if there are no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Drops every subscription without any server round trip.
    ///
    /// Returns the topics that were subscribed.
    pub fn clear(&mut self) -> Vec<Topic> {
        let topics = self.topics();
        self.subscriptions.clear();
        topics
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn topic() -> Topic {
        Topic::from("room:1")
    }

    fn registry_with_pending() -> TopicRegistry {
        let mut registry = TopicRegistry::new();
        let result = registry.begin_join(topic(), MessageRef::from("1"), ConnectionId::new());
        assert!(result.is_ok());
        registry
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let mut registry = registry_with_pending();
        let second = registry.begin_join(topic(), MessageRef::from("2"), ConnectionId::new());
        assert_eq!(second, Err(MuxError::DuplicateJoin(topic())));
        assert_eq!(registry.len(), 1);
        let Some(sub) = registry.get(&topic()) else {
            panic!("subscription exists");
        };
        assert_eq!(sub.join_ref, MessageRef::from("1"));
    }

    #[test]
    fn confirm_join_records_events() {
        let mut registry = registry_with_pending();
        let Some(sub) = registry.confirm_join(&topic(), vec!["chat".to_string()]) else {
            panic!("subscription exists");
        };
        assert_eq!(sub.status, JoinStatus::Joined);
        assert!(sub.recognizes("chat"));
        assert!(registry.is_active(&topic()));
    }

    #[test]
    fn leave_unknown_topic_errors() {
        let mut registry = TopicRegistry::new();
        assert_eq!(
            registry.request_leave(&topic()),
            Err(MuxError::UnknownTopicOperation(topic()))
        );
    }

    #[test]
    fn leave_pending_is_deferred_once() {
        let mut registry = registry_with_pending();
        assert_eq!(registry.request_leave(&topic()), Ok(LeaveAction::Deferred));
        assert_eq!(registry.request_leave(&topic()), Ok(LeaveAction::AlreadyLeaving));
    }

    #[test]
    fn leave_joined_sends_then_waits() {
        let mut registry = registry_with_pending();
        let _ = registry.confirm_join(&topic(), Vec::new());
        assert_eq!(registry.request_leave(&topic()), Ok(LeaveAction::SendLeave));
        registry.mark_leave_sent(&topic(), MessageRef::from("2"));
        assert!(!registry.is_active(&topic()));
        assert_eq!(registry.request_leave(&topic()), Ok(LeaveAction::AlreadyLeaving));
    }

    #[test]
    fn clear_returns_sorted_topics() {
        let mut registry = registry_with_pending();
        let _ = registry.begin_join(Topic::from("a:1"), MessageRef::from("2"), ConnectionId::new());
        let cleared = registry.clear();
        assert_eq!(cleared, vec![Topic::from("a:1"), topic()]);
        assert!(registry.is_empty());
    }
}
