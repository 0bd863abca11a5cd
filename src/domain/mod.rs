//! Domain layer: identifiers, envelopes, subscriptions, and presence.
//!
//! This module contains the client-side state model: topic and connection
//! identity, the normalized envelopes and events exchanged with the host,
//! the topic registry enforcing one subscription per topic, and the
//! presence tracker holding each topic's membership.

pub mod connection_id;
pub mod connection_state;
pub mod envelope;
pub mod event_bus;
pub mod host_event;
pub mod presence;
pub mod subscription;
pub mod topic;
pub mod topic_registry;

pub use connection_id::ConnectionId;
pub use connection_state::ConnectionState;
pub use envelope::{MessageEnvelope, OutboundMessage};
pub use event_bus::EventBus;
pub use host_event::HostEvent;
pub use presence::{PresenceDiff, PresenceState, PresenceTracker};
pub use subscription::{ChannelSubscription, JoinStatus, LeaveState};
pub use topic::Topic;
pub use topic_registry::{LeaveAction, TopicRegistry};
