//! Wire protocol: frame codec, reserved events, and reply parsing.
//!
//! Frames use the Phoenix Channels V2 JSON serializer, a five element array:
//!
//! ```text
//! [join_ref, ref, topic, event, payload]
//! ```
//!
//! Join, leave and push requests are answered with a `phx_reply` frame
//! carrying the request's `ref` and a `{"status", "response"}` payload.

pub mod frame;
pub mod reply;

pub use frame::{Frame, MessageRef, RefCounter};
pub use reply::{Reply, ReplyStatus};

/// Protocol version sent as the `vsn` connection parameter.
pub const PROTOCOL_VSN: &str = "2.0.0";

/// Topic used for socket-level heartbeats.
pub const HEARTBEAT_TOPIC: &str = "phoenix";

/// Reserved event names.
pub mod events {
    /// Join request.
    pub const JOIN: &str = "phx_join";
    /// Leave request.
    pub const LEAVE: &str = "phx_leave";
    /// Reply to any request, correlated by `ref`.
    pub const REPLY: &str = "phx_reply";
    /// Server-side channel crash.
    pub const ERROR: &str = "phx_error";
    /// Server-side channel shutdown.
    pub const CLOSE: &str = "phx_close";
    /// Socket keep-alive on [`super::HEARTBEAT_TOPIC`].
    pub const HEARTBEAT: &str = "heartbeat";
    /// Full presence snapshot.
    pub const PRESENCE_STATE: &str = "presence_state";
    /// Incremental presence change.
    pub const PRESENCE_DIFF: &str = "presence_diff";

    /// Returns `true` for names the protocol reserves; these are never
    /// forwarded to the host as application events.
    #[must_use]
    pub fn is_reserved(event: &str) -> bool {
        matches!(
            event,
            JOIN | LEAVE | REPLY | ERROR | CLOSE | HEARTBEAT | PRESENCE_STATE | PRESENCE_DIFF
        )
    }
}

#[cfg(test)]
mod tests {
    use super::events;

    #[test]
    fn reserved_events() {
        assert!(events::is_reserved("phx_reply"));
        assert!(events::is_reserved("presence_diff"));
        assert!(!events::is_reserved("chat"));
    }
}
