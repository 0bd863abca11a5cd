//! Connection manager event loop.
//!
//! [`ConnectionManager`] is the single actor that owns the transport and the
//! [`Multiplexer`]. Host commands arrive on one MPSC queue; inbound frames,
//! reply deadlines and heartbeat ticks are multiplexed with them in a
//! `tokio::select!` loop, so every state transition is serialized.

use std::fmt;
use std::future::pending;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::multiplexer::Multiplexer;
use crate::config::MuxConfig;
use crate::domain::{ConnectionId, ConnectionState, EventBus, HostEvent, OutboundMessage, Topic};
use crate::error::MuxError;
use crate::protocol::Frame;
use crate::transport::{Connector, Transport};

/// Typed host command consumed by the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Open the transport with a credential.
    Connect {
        /// Credential passed to the connector.
        token: String,
    },
    /// Close the transport and drop all topic state.
    Disconnect,
    /// Join a topic.
    Join(Topic),
    /// Leave a topic.
    Leave(Topic),
    /// Push an event on a joined topic.
    Send(OutboundMessage),
}

/// Owns one connector, at most one open transport, and all channel state.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    connect_timeout: Duration,
    heartbeat_interval: Option<Duration>,
    state: watch::Sender<ConnectionState>,
    link: Option<C::Transport>,
    heartbeat: Option<Interval>,
    mux: Multiplexer,
    events: EventBus,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl<C: Connector> fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &*self.state.borrow())
            .field("linked", &self.link.is_some())
            .field("mux", &self.mux)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a manager reading `commands` and publishing to `events`.
    #[must_use]
    pub fn new(
        connector: C,
        config: &MuxConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        events: EventBus,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            connector,
            connect_timeout: config.connect_timeout,
            heartbeat_interval: config.heartbeat_interval,
            state,
            link: None,
            heartbeat: None,
            mux: Multiplexer::new(events.clone(), config.push_timeout),
            events,
            commands,
        }
    }

    /// Runs until every command sender is dropped.
    ///
    /// An open transport is closed on the way out.
    pub async fn run(mut self) {
        loop {
            let Some(link) = self.link.as_mut() else {
                match self.commands.recv().await {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                }
                continue;
            };
            let deadline = self.mux.next_deadline();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                inbound = link.recv() => self.handle_inbound(inbound).await,
                () = sleep_until_deadline(deadline) => self.mux.expire(Instant::now()),
                () = tick(self.heartbeat.as_mut()) => self.beat().await,
            }
        }
        self.teardown().await;
        tracing::debug!("connection manager stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        let now = Instant::now();
        let frame = match command {
            Command::Connect { token } => {
                self.connect(&token).await;
                None
            }
            Command::Disconnect => {
                self.teardown().await;
                None
            }
            Command::Join(topic) if self.accepting("join") => self.mux.join(topic, now),
            Command::Leave(topic) if self.accepting("leave") => self.mux.leave(&topic, now),
            Command::Send(message) if self.accepting("send") => self.mux.send(message, now),
            Command::Join(_) | Command::Leave(_) | Command::Send(_) => None,
        };
        if let Some(frame) = frame {
            self.write(frame).await;
        }
    }

    /// Returns `true` when topic commands may run, reporting rejection
    /// otherwise.
    fn accepting(&self, command: &'static str) -> bool {
        let state = *self.state.borrow();
        if state.accepts_commands() && self.link.is_some() {
            return true;
        }
        tracing::warn!(command, %state, "socket not connected, command rejected");
        self.events.publish(HostEvent::CommandRejected {
            error: MuxError::NotConnected,
        });
        false
    }

    async fn connect(&mut self, token: &str) {
        if self.link.is_some() {
            tracing::debug!("already connected");
            self.events.publish(HostEvent::SocketOpened);
            return;
        }
        self.set_state(ConnectionState::Connecting);
        tracing::info!("connecting");

        let opened = tokio::time::timeout(self.connect_timeout, self.connector.connect(token)).await;
        let link = match opened {
            Ok(Ok(link)) => link,
            Ok(Err(error)) => return self.connect_failed(error),
            Err(_) => {
                let ms = u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX);
                return self.connect_failed(MuxError::ConnectTimedOut(ms));
            }
        };

        let connection = ConnectionId::new();
        self.mux.attach(connection);
        self.link = Some(link);
        self.heartbeat = self.heartbeat_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        self.set_state(ConnectionState::Connected);
        tracing::info!(%connection, "socket opened");
        self.events.publish(HostEvent::SocketOpened);
    }

    fn connect_failed(&mut self, error: MuxError) {
        tracing::warn!(%error, "failed to connect");
        self.set_state(ConnectionState::Disconnected);
        self.events.publish(HostEvent::ConnectionFailed { error });
    }

    /// Closes the transport and drops all channel state locally.
    ///
    /// Publishes exactly one `SocketDisconnected`; a no-op when no
    /// transport is open.
    async fn teardown(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        self.set_state(ConnectionState::Disconnecting);
        match tokio::time::timeout(self.connect_timeout, link.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => tracing::debug!(%error, "transport close failed"),
            Err(_) => tracing::debug!("transport close timed out"),
        }
        let connection = self.mux.connection();
        let topics = self.mux.detach();
        self.heartbeat = None;
        self.set_state(ConnectionState::Disconnected);
        tracing::info!(
            connection = ?connection,
            dropped_topics = topics.len(),
            "socket disconnected"
        );
        self.events.publish(HostEvent::SocketDisconnected);
    }

    async fn handle_inbound(&mut self, inbound: Option<Result<String, MuxError>>) {
        match inbound {
            Some(Ok(text)) => match Frame::decode(&text) {
                Ok(frame) => {
                    if let Some(reply) = self.mux.handle_frame(frame, Instant::now()) {
                        self.write(reply).await;
                    }
                }
                Err(error) => tracing::warn!(%error, "dropping undecodable frame"),
            },
            Some(Err(error)) => {
                tracing::warn!(%error, "transport error");
                self.teardown().await;
            }
            None => {
                tracing::info!("transport closed by peer");
                self.teardown().await;
            }
        }
    }

    async fn beat(&mut self) {
        match self.mux.heartbeat() {
            Ok(Some(frame)) => self.write(frame).await,
            Ok(None) => {}
            Err(_) => self.teardown().await,
        }
    }

    async fn write(&mut self, frame: Frame) {
        let text = match frame.encode() {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(topic = %frame.topic, event = %frame.event, %error, "failed to encode frame");
                return;
            }
        };
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if let Err(error) = link.send(text).await {
            tracing::warn!(topic = %frame.topic, event = %frame.event, %error, "failed to write frame");
            self.teardown().await;
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "connection state");
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
