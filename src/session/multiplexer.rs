//! Sans-IO topic multiplexer.
//!
//! [`Multiplexer`] is the explicit owned state behind one socket: the topic
//! registry, the presence tracker, the router, the ref counter and the table
//! of requests awaiting a reply. It performs no I/O. Each operation takes the
//! current time, publishes host events through the [`EventBus`], and returns
//! the frames the caller must write to the transport.
//!
//! All state is created by [`Multiplexer::attach`] when a transport opens and
//! torn down by [`Multiplexer::detach`] when it closes.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use super::router::{DropReason, MessageRouter, Route};
use crate::domain::{
    ConnectionId, EventBus, HostEvent, LeaveAction, LeaveState, OutboundMessage, PresenceTracker,
    Topic, TopicRegistry,
};
use crate::error::MuxError;
use crate::protocol::{Frame, MessageRef, RefCounter, Reply, ReplyStatus};

/// What a pending request was.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingKind {
    Join,
    Leave,
    Push { event: String },
}

/// A request awaiting its `phx_reply`.
#[derive(Debug, Clone)]
struct PendingReply {
    topic: Topic,
    kind: PendingKind,
    deadline: Instant,
}

/// Owned channel state for one connection.
#[derive(Debug)]
pub struct Multiplexer {
    connection: Option<ConnectionId>,
    registry: TopicRegistry,
    presence: PresenceTracker,
    router: MessageRouter,
    refs: RefCounter,
    pending: HashMap<MessageRef, PendingReply>,
    heartbeat: Option<MessageRef>,
    push_timeout: Duration,
    events: EventBus,
}

impl Multiplexer {
    /// Creates a detached multiplexer publishing to `events`.
    #[must_use]
    pub fn new(events: EventBus, push_timeout: Duration) -> Self {
        Self {
            connection: None,
            registry: TopicRegistry::new(),
            presence: PresenceTracker::new(),
            router: MessageRouter::new(),
            refs: RefCounter::new(),
            pending: HashMap::new(),
            heartbeat: None,
            push_timeout,
            events,
        }
    }

    /// Binds the multiplexer to a freshly opened connection.
    ///
    /// Refs restart at `"1"` for every connection.
    pub fn attach(&mut self, connection: ConnectionId) {
        self.detach();
        self.connection = Some(connection);
        self.refs = RefCounter::new();
    }

    /// Drops every subscription, presence state and pending request without
    /// any server round trip.
    ///
    /// Returns the topics that were subscribed. No per-topic event is
    /// published; the caller reports the disconnect once.
    pub fn detach(&mut self) -> Vec<Topic> {
        self.connection = None;
        self.pending.clear();
        self.heartbeat = None;
        self.presence.clear();
        self.registry.clear()
    }

    /// Returns the connection this state belongs to.
    #[must_use]
    pub const fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Returns the topic registry.
    #[must_use]
    pub const fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// Returns the presence tracker.
    #[must_use]
    pub const fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Returns the router and its counters.
    #[must_use]
    pub const fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Returns the number of requests awaiting a reply.
    #[must_use]
    pub fn pending_replies(&self) -> usize {
        self.pending.len()
    }

    /// Earliest reply deadline, if any request is outstanding.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Requests a join of `topic`.
    ///
    /// Duplicate joins are logged, reported as
    /// [`HostEvent::CommandRejected`], and produce no frame.
    pub fn join(&mut self, topic: Topic, now: Instant) -> Option<Frame> {
        let connection = self.require_connection()?;
        let join_ref = self.refs.next_ref();
        if let Err(err) = self
            .registry
            .begin_join(topic.clone(), join_ref.clone(), connection)
        {
            tracing::warn!(%topic, "tried to join existing channel");
            self.reject(err);
            return None;
        }
        self.presence.track(topic.clone());
        self.expect_reply(join_ref.clone(), topic.clone(), PendingKind::Join, now);
        tracing::debug!(%topic, %join_ref, "joining topic");
        Some(Frame::join(topic, join_ref))
    }

    /// Requests a leave of `topic`.
    ///
    /// Leaving a pending join is deferred until the join settles; the
    /// settled join never resurrects the subscription.
    pub fn leave(&mut self, topic: &Topic, now: Instant) -> Option<Frame> {
        self.require_connection()?;
        match self.registry.request_leave(topic) {
            Ok(LeaveAction::SendLeave) => self.issue_leave(topic, now),
            Ok(LeaveAction::Deferred) => {
                tracing::debug!(%topic, "leave deferred until join settles");
                None
            }
            Ok(LeaveAction::AlreadyLeaving) => None,
            Err(err) => {
                tracing::debug!(%topic, "leave for unknown topic ignored");
                self.reject(err);
                None
            }
        }
    }

    /// Pushes an application event on a joined topic.
    pub fn send(&mut self, message: OutboundMessage, now: Instant) -> Option<Frame> {
        self.require_connection()?;
        let OutboundMessage {
            topic,
            event,
            payload,
            expects_reply,
        } = message;
        let Some(join_ref) = self
            .registry
            .get(&topic)
            .filter(|sub| sub.is_active())
            .map(|sub| sub.join_ref.clone())
        else {
            tracing::warn!(%topic, %event, "push to topic without joined subscription");
            self.reject(MuxError::UnknownTopicOperation(topic));
            return None;
        };
        let msg_ref = self.refs.next_ref();
        if expects_reply {
            let kind = PendingKind::Push {
                event: event.clone(),
            };
            self.expect_reply(msg_ref.clone(), topic.clone(), kind, now);
        }
        Some(Frame::push(topic, event, payload, join_ref, msg_ref))
    }

    /// Produces the next heartbeat frame.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::TransportClosed`] if the previous heartbeat is
    /// still unanswered; the caller must tear the connection down.
    pub fn heartbeat(&mut self) -> Result<Option<Frame>, MuxError> {
        if self.connection.is_none() {
            return Ok(None);
        }
        if let Some(missed) = &self.heartbeat {
            tracing::warn!(%missed, "heartbeat timeout");
            return Err(MuxError::TransportClosed);
        }
        let msg_ref = self.refs.next_ref();
        self.heartbeat = Some(msg_ref.clone());
        Ok(Some(Frame::heartbeat(msg_ref)))
    }

    /// Applies one inbound frame.
    ///
    /// Returns a frame to write when a deferred leave becomes due.
    pub fn handle_frame(&mut self, frame: Frame, now: Instant) -> Option<Frame> {
        match self.router.route(&self.registry, frame) {
            Route::Reply {
                topic,
                msg_ref,
                reply,
            } => return self.handle_reply(&topic, msg_ref, reply, now),
            Route::PresenceState { topic, state } => {
                if let Some(current) = self.presence.apply_state(&topic, state) {
                    let state = current.clone();
                    tracing::debug!(%topic, present = state.len(), "presence_state");
                    self.events.publish(HostEvent::PresenceUpdated { topic, state });
                }
            }
            Route::PresenceDiff { topic, diff } => {
                if let Some(current) = self.presence.apply_diff(&topic, diff) {
                    let state = current.clone();
                    tracing::debug!(%topic, present = state.len(), "presence_diff");
                    self.events.publish(HostEvent::PresenceUpdated { topic, state });
                }
            }
            Route::Deliver(envelope) => {
                tracing::debug!(topic = %envelope.topic, event = %envelope.event, "forwarding event");
                self.events.publish(HostEvent::MessageReceived(envelope));
            }
            Route::ChannelClosed {
                topic,
                errored,
                payload,
            } => {
                if errored {
                    tracing::warn!(%topic, %payload, "channel errored on server");
                } else {
                    tracing::info!(%topic, "channel closed by server");
                }
                self.pending.retain(|_, p| p.topic != topic);
                self.finish_leave(&topic);
            }
            Route::Drop(DropReason::Malformed(err)) => {
                tracing::warn!(error = %err, "dropping malformed frame");
            }
            Route::Drop(reason) => {
                tracing::trace!(?reason, "dropping frame");
            }
        }
        None
    }

    /// Resolves every request whose deadline is at or before `now`.
    ///
    /// Timed-out joins are discarded, timed-out leaves complete locally and
    /// timed-out pushes are reported as failed.
    pub fn expire(&mut self, now: Instant) {
        let expired: Vec<MessageRef> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(r, _)| r.clone())
            .collect();
        for msg_ref in expired {
            let Some(pending) = self.pending.remove(&msg_ref) else {
                continue;
            };
            let topic = pending.topic;
            match pending.kind {
                PendingKind::Join => {
                    let leaving = self.registry.get(&topic).is_some_and(|s| s.is_leaving());
                    if leaving {
                        self.finish_leave(&topic);
                    } else {
                        tracing::warn!(%topic, "join timed out");
                        self.discard(&topic);
                        self.events.publish(HostEvent::JoinFailed {
                            error: MuxError::JoinTimedOut(topic.clone()),
                            topic,
                        });
                    }
                }
                PendingKind::Leave => {
                    tracing::debug!(%topic, "leave timed out, closing locally");
                    self.finish_leave(&topic);
                }
                PendingKind::Push { event } => {
                    tracing::warn!(%topic, %event, "timed out pushing");
                    self.events.publish(HostEvent::PushFailed {
                        error: MuxError::SendTimedOut {
                            topic: topic.clone(),
                            event: event.clone(),
                        },
                        topic,
                        event,
                    });
                }
            }
        }
    }

    fn handle_reply(
        &mut self,
        topic: &Topic,
        msg_ref: MessageRef,
        reply: Reply,
        now: Instant,
    ) -> Option<Frame> {
        if self.heartbeat.as_ref() == Some(&msg_ref) {
            self.heartbeat = None;
            return None;
        }
        let Some(pending) = self.pending.get(&msg_ref) else {
            tracing::trace!(%topic, %msg_ref, "reply for untracked ref");
            return None;
        };
        if pending.topic != *topic {
            tracing::warn!(%topic, %msg_ref, expected = %pending.topic, "reply topic mismatch");
            return None;
        }
        let pending = self.pending.remove(&msg_ref)?;
        match pending.kind {
            PendingKind::Join => self.settle_join(pending.topic, reply, now),
            PendingKind::Leave => {
                tracing::info!(%topic, "left topic");
                self.finish_leave(topic);
                None
            }
            PendingKind::Push { event } => {
                match &reply.status {
                    ReplyStatus::Ok => {
                        tracing::debug!(%topic, %event, "server replied");
                        self.events.publish(HostEvent::PushReplied {
                            topic: pending.topic,
                            event,
                            response: reply.response,
                        });
                    }
                    ReplyStatus::Error | ReplyStatus::Other(_) => {
                        tracing::warn!(
                            %topic,
                            %event,
                            status = reply.status.as_str(),
                            response = %reply.response,
                            "server errored"
                        );
                        self.events.publish(HostEvent::PushFailed {
                            error: MuxError::SendFailed {
                                topic: pending.topic.clone(),
                                event: event.clone(),
                                response: reply.response,
                            },
                            topic: pending.topic,
                            event,
                        });
                    }
                }
                None
            }
        }
    }

    fn settle_join(&mut self, topic: Topic, reply: Reply, now: Instant) -> Option<Frame> {
        let deferred_leave = self
            .registry
            .get(&topic)
            .is_some_and(|s| s.leave == LeaveState::Deferred);
        match &reply.status {
            ReplyStatus::Ok => {
                let declared = reply.declared_events();
                self.registry.confirm_join(&topic, declared)?;
                if deferred_leave {
                    tracing::debug!(%topic, "join settled, issuing deferred leave");
                    return self.issue_leave(&topic, now);
                }
                tracing::info!(%topic, "joined topic");
                self.events.publish(HostEvent::TopicJoined { topic });
                None
            }
            ReplyStatus::Error | ReplyStatus::Other(_) => {
                if deferred_leave {
                    self.finish_leave(&topic);
                    return None;
                }
                tracing::warn!(
                    %topic,
                    status = reply.status.as_str(),
                    response = %reply.response,
                    "join rejected"
                );
                self.discard(&topic);
                self.events.publish(HostEvent::JoinFailed {
                    error: MuxError::JoinRejected {
                        topic: topic.clone(),
                        response: reply.response,
                    },
                    topic,
                });
                None
            }
        }
    }

    fn issue_leave(&mut self, topic: &Topic, now: Instant) -> Option<Frame> {
        let join_ref = self.registry.get(topic).map(|s| s.join_ref.clone())?;
        let leave_ref = self.refs.next_ref();
        self.registry.mark_leave_sent(topic, leave_ref.clone());
        self.expect_reply(leave_ref.clone(), topic.clone(), PendingKind::Leave, now);
        Some(Frame::leave(topic.clone(), join_ref, leave_ref))
    }

    /// Removes the subscription and its presence, reporting `TopicLeft`.
    fn finish_leave(&mut self, topic: &Topic) {
        if self.discard(topic) {
            self.events.publish(HostEvent::TopicLeft {
                topic: topic.clone(),
            });
        }
    }

    /// Removes the subscription and its presence silently.
    fn discard(&mut self, topic: &Topic) -> bool {
        self.presence.untrack(topic);
        self.registry.remove(topic).is_some()
    }

    fn expect_reply(&mut self, msg_ref: MessageRef, topic: Topic, kind: PendingKind, now: Instant) {
        let deadline = now + self.push_timeout;
        self.pending.insert(
            msg_ref,
            PendingReply {
                topic,
                kind,
                deadline,
            },
        );
    }

    fn require_connection(&self) -> Option<ConnectionId> {
        if self.connection.is_none() {
            self.reject(MuxError::NotConnected);
        }
        self.connection
    }

    fn reject(&self, error: MuxError) {
        self.events.publish(HostEvent::CommandRejected { error });
    }
}
