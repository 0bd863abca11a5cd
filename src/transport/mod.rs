//! Transport adapter boundary.
//!
//! The connection manager owns exactly one [`Transport`] at a time and
//! obtains it from a [`Connector`]. Everything above this module deals in
//! text frames only; how bytes move is the adapter's business.
//!
//! Two adapters ship with the crate:
//!
//! - [`websocket::WsConnector`] speaks WebSocket via `tokio-tungstenite`.
//! - [`memory::MemoryConnector`] hands out in-process channel pairs, used by
//!   tests and by hosts that want to script a server.

pub mod memory;
pub mod websocket;

use std::future::Future;

use crate::error::MuxError;

/// One open, full-duplex framed connection.
///
/// `recv` must be cancel-safe: the connection manager polls it inside
/// `tokio::select!` alongside commands and timers.
pub trait Transport: Send + 'static {
    /// Writes one text frame.
    fn send(&mut self, text: String) -> impl Future<Output = Result<(), MuxError>> + Send;

    /// Reads the next text frame; `None` once the peer closed.
    fn recv(&mut self) -> impl Future<Output = Option<Result<String, MuxError>>> + Send;

    /// Closes the connection.
    fn close(&mut self) -> impl Future<Output = Result<(), MuxError>> + Send;
}

/// Opens transports with a credential.
pub trait Connector: Send + Sync + 'static {
    /// Transport produced by this connector.
    type Transport: Transport;

    /// Opens a new transport authenticated with `token`.
    fn connect(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Self::Transport, MuxError>> + Send;
}
