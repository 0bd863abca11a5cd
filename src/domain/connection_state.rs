//! Socket lifecycle state.

use std::fmt;

use serde::Serialize;

/// Lifecycle of the single transport connection.
///
/// Owned by the connection manager; transitions happen one at a time on its
/// event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport. Join, leave and send are not accepted.
    #[default]
    Disconnected,
    /// The transport is opening.
    Connecting,
    /// The transport is open; the command surface is active.
    Connected,
    /// The transport is closing and channel state is being torn down.
    Disconnecting,
}

impl ConnectionState {
    /// Returns `true` only in [`ConnectionState::Connected`].
    #[must_use]
    pub const fn accepts_commands(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns the state name as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
