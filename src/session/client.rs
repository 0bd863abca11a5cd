//! Host-facing handle to a running connection manager.

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use super::manager::{Command, ConnectionManager};
use crate::config::MuxConfig;
use crate::domain::{ConnectionState, EventBus, HostEvent, OutboundMessage, Topic};
use crate::error::MuxError;
use crate::transport::Connector;

/// Cloneable command handle.
///
/// Every command returns as soon as it is queued; outcomes arrive later as
/// [`HostEvent`]s on the receiver returned by [`MuxClient::start`]. The
/// manager task stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct MuxClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl MuxClient {
    /// Spawns a connection manager on the current Tokio runtime.
    ///
    /// Returns the command handle and the ordered stream of host events.
    #[must_use]
    pub fn start<C: Connector>(
        connector: C,
        config: &MuxConfig,
    ) -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (events, event_rx) = EventBus::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let manager = ConnectionManager::new(connector, config, command_rx, events, state_tx);
        tokio::spawn(manager.run());
        (
            Self {
                commands: command_tx,
                state: state_rx,
            },
            event_rx,
        )
    }

    /// Opens the socket with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::ClientClosed`] if the manager task is gone.
    pub fn connect(&self, token: impl Into<String>) -> Result<(), MuxError> {
        self.submit(Command::Connect {
            token: token.into(),
        })
    }

    /// Closes the socket; all topic state is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::ClientClosed`] if the manager task is gone.
    pub fn disconnect(&self) -> Result<(), MuxError> {
        self.submit(Command::Disconnect)
    }

    /// Joins `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::ClientClosed`] if the manager task is gone.
    pub fn join_topic(&self, topic: impl Into<Topic>) -> Result<(), MuxError> {
        self.submit(Command::Join(topic.into()))
    }

    /// Leaves `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::ClientClosed`] if the manager task is gone.
    pub fn leave_topic(&self, topic: impl Into<Topic>) -> Result<(), MuxError> {
        self.submit(Command::Leave(topic.into()))
    }

    /// Pushes `event` with `payload` on a joined topic, expecting a reply.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::ClientClosed`] if the manager task is gone.
    pub fn send_message(
        &self,
        topic: impl Into<Topic>,
        event: impl Into<String>,
        payload: Value,
    ) -> Result<(), MuxError> {
        self.send(OutboundMessage::new(topic, event, payload))
    }

    /// Pushes a prepared message.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::ClientClosed`] if the manager task is gone.
    pub fn send(&self, message: OutboundMessage) -> Result<(), MuxError> {
        self.submit(Command::Send(message))
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver notified on every state transition.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Waits until the connection reaches `target`.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::ClientClosed`] if the manager stops first.
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<(), MuxError> {
        let mut changes = self.state.clone();
        changes
            .wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| MuxError::ClientClosed)
    }

    /// Returns `true` once the manager task has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn submit(&self, command: Command) -> Result<(), MuxError> {
        self.commands
            .send(command)
            .map_err(|_| MuxError::ClientClosed)
    }
}
