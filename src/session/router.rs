//! Inbound frame classification.
//!
//! [`MessageRouter`] decides what an inbound [`Frame`] means for the current
//! subscriptions: a reply to correlate, a presence update to apply, an
//! application event to deliver, a server-side channel shutdown, or noise to
//! drop. It never mutates the registry; the multiplexer acts on the result.

use serde_json::Value;

use crate::domain::{MessageEnvelope, PresenceDiff, PresenceState, Topic, TopicRegistry};
use crate::error::MuxError;
use crate::protocol::{Frame, MessageRef, Reply, events};

/// Routing decision for one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// `phx_reply` to correlate with a pending request.
    Reply {
        /// Topic the reply arrived on.
        topic: Topic,
        /// Ref of the request being answered.
        msg_ref: MessageRef,
        /// Parsed reply payload.
        reply: Reply,
    },
    /// Full presence snapshot for an active topic.
    PresenceState {
        /// Topic the snapshot belongs to.
        topic: Topic,
        /// Parsed snapshot.
        state: PresenceState,
    },
    /// Incremental presence change for an active topic.
    PresenceDiff {
        /// Topic the diff belongs to.
        topic: Topic,
        /// Parsed diff.
        diff: PresenceDiff,
    },
    /// Application event to forward to the host.
    Deliver(MessageEnvelope),
    /// The server closed or crashed the channel for a subscribed topic.
    ChannelClosed {
        /// Affected topic.
        topic: Topic,
        /// `true` for `phx_error`, `false` for `phx_close`.
        errored: bool,
        /// Payload sent with the close or error.
        payload: Value,
    },
    /// The frame is not relevant to any subscription.
    Drop(DropReason),
}

/// Why a frame was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// No subscription exists for the topic.
    UnknownTopic,
    /// The subscription is pending or leaving.
    NotActive,
    /// The frame belongs to an earlier join of the same topic.
    StaleJoinRef,
    /// The event is not in the topic's declared set.
    UnrecognizedEvent,
    /// A reply without a ref, or a reply the router cannot parse.
    Malformed(MuxError),
}

/// Stateless classifier with delivery counters.
#[derive(Debug, Default)]
pub struct MessageRouter {
    delivered: u64,
    dropped: u64,
}

impl MessageRouter {
    /// Creates a router with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `frame` against the current subscriptions.
    pub fn route(&mut self, registry: &TopicRegistry, frame: Frame) -> Route {
        let route = classify(registry, frame);
        match &route {
            Route::Deliver(_) => self.delivered = self.delivered.saturating_add(1),
            Route::Drop(_) => self.dropped = self.dropped.saturating_add(1),
            _ => {}
        }
        route
    }

    /// Number of frames forwarded to the host as messages.
    #[must_use]
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Number of frames dropped.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}

fn classify(registry: &TopicRegistry, frame: Frame) -> Route {
    let Frame {
        join_ref,
        msg_ref,
        topic,
        event,
        payload,
    } = frame;

    if event == events::REPLY {
        let Some(msg_ref) = msg_ref else {
            return Route::Drop(DropReason::Malformed(MuxError::MalformedFrame(
                "reply without ref".to_string(),
            )));
        };
        return match Reply::from_payload(payload) {
            Ok(reply) => Route::Reply {
                topic,
                msg_ref,
                reply,
            },
            Err(err) => Route::Drop(DropReason::Malformed(err)),
        };
    }

    let Some(sub) = registry.get(&topic) else {
        return Route::Drop(DropReason::UnknownTopic);
    };
    if join_ref.as_ref().is_some_and(|r| *r != sub.join_ref) {
        return Route::Drop(DropReason::StaleJoinRef);
    }

    if event == events::CLOSE || event == events::ERROR {
        return Route::ChannelClosed {
            topic,
            errored: event == events::ERROR,
            payload,
        };
    }

    if !sub.is_active() {
        return Route::Drop(DropReason::NotActive);
    }

    if event == events::PRESENCE_STATE {
        return match PresenceState::from_wire(&payload) {
            Ok(state) => Route::PresenceState { topic, state },
            Err(err) => Route::Drop(DropReason::Malformed(err)),
        };
    }
    if event == events::PRESENCE_DIFF {
        return match PresenceDiff::from_wire(&payload) {
            Ok(diff) => Route::PresenceDiff { topic, diff },
            Err(err) => Route::Drop(DropReason::Malformed(err)),
        };
    }
    if sub.recognizes(&event) && !events::is_reserved(&event) {
        return Route::Deliver(MessageEnvelope::new(topic, event, payload));
    }
    Route::Drop(DropReason::UnrecognizedEvent)
}
