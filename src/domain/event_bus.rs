//! Ordered delivery channel for [`HostEvent`]s.
//!
//! [`EventBus`] wraps an unbounded [`tokio::sync::mpsc`] channel. Unlike a
//! broadcast ring buffer it never drops an event for a slow reader, which
//! keeps per-topic delivery exactly-once and in arrival order.

use tokio::sync::mpsc;

use super::HostEvent;

/// Sending half of the host event stream.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: mpsc::UnboundedSender<HostEvent>,
}

impl EventBus {
    /// Creates a bus and the receiver the host reads events from.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Publishes an event to the host.
    ///
    /// Returns `false` if the host dropped its receiver; the event is
    /// discarded in that case.
    pub fn publish(&self, event: HostEvent) -> bool {
        tracing::trace!(event = event.event_type_str(), "host event");
        self.sender.send(event).is_ok()
    }

    /// Returns `true` if the host receiver has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Topic;

    #[test]
    fn publish_after_receiver_dropped_returns_false() {
        let (bus, rx) = EventBus::new();
        drop(rx);
        assert!(bus.is_closed());
        assert!(!bus.publish(HostEvent::SocketOpened));
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let (bus, mut rx) = EventBus::new();
        bus.publish(HostEvent::SocketOpened);
        bus.publish(HostEvent::TopicJoined {
            topic: Topic::from("room:1"),
        });
        bus.publish(HostEvent::SocketDisconnected);

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.event_type_str());
        }
        assert_eq!(
            seen,
            vec!["socket_opened", "topic_joined", "socket_disconnected"]
        );
    }

    #[test]
    fn cloned_bus_shares_receiver() {
        let (bus, mut rx) = EventBus::new();
        let other = bus.clone();
        other.publish(HostEvent::SocketOpened);
        let Ok(event) = rx.try_recv() else {
            panic!("expected event");
        };
        assert_eq!(event, HostEvent::SocketOpened);
    }
}
