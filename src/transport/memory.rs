//! In-process transport backed by MPSC channels.
//!
//! [`MemoryConnector`] hands out one queued connection outcome per
//! `connect` call. Each successful outcome pairs a [`MemoryTransport`] (the
//! client side) with a [`MemoryServer`] the caller keeps to script the peer.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use super::{Connector, Transport};
use crate::error::MuxError;
use crate::protocol::Frame;

/// Client half of an in-memory connection.
#[derive(Debug)]
pub struct MemoryTransport {
    outgoing: Option<mpsc::UnboundedSender<String>>,
    incoming: mpsc::UnboundedReceiver<String>,
}

/// Server half of an in-memory connection.
#[derive(Debug)]
pub struct MemoryServer {
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

/// Creates a connected client/server pair.
#[must_use]
pub fn pair() -> (MemoryTransport, MemoryServer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            outgoing: Some(client_tx),
            incoming: client_rx,
        },
        MemoryServer {
            to_client: Some(server_tx),
            from_client: server_rx,
        },
    )
}

impl Transport for MemoryTransport {
    async fn send(&mut self, text: String) -> Result<(), MuxError> {
        let Some(outgoing) = &self.outgoing else {
            return Err(MuxError::TransportClosed);
        };
        outgoing.send(text).map_err(|_| MuxError::TransportClosed)
    }

    async fn recv(&mut self) -> Option<Result<String, MuxError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), MuxError> {
        self.outgoing = None;
        self.incoming.close();
        Ok(())
    }
}

impl MemoryServer {
    /// Sends raw text to the client. Returns `false` once the client is gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(text.into()).is_ok())
    }

    /// Encodes and sends a frame to the client.
    pub fn send_frame(&self, frame: &Frame) -> bool {
        frame.encode().is_ok_and(|text| self.send_text(text))
    }

    /// Receives the next raw text the client wrote.
    pub async fn recv_text(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Receives and decodes the next frame the client wrote.
    ///
    /// Undecodable text is skipped.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        loop {
            let text = self.from_client.recv().await?;
            if let Ok(frame) = Frame::decode(&text) {
                return Some(frame);
            }
        }
    }

    /// Returns a frame the client already wrote, without waiting.
    pub fn try_recv_frame(&mut self) -> Option<Frame> {
        let text = self.from_client.try_recv().ok()?;
        Frame::decode(&text).ok()
    }

    /// Closes the connection from the server side.
    pub fn close(&mut self) {
        self.to_client = None;
    }
}

/// Connector replaying queued outcomes.
///
/// Cloning shares the queue and the recorded tokens.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    outcomes: Arc<Mutex<VecDeque<Result<MemoryTransport, MuxError>>>>,
    tokens: Arc<Mutex<Vec<String>>>,
}

impl MemoryConnector {
    /// Creates a connector with no queued outcomes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful connection and returns its server half.
    pub async fn accept_next(&self) -> MemoryServer {
        let (client, server) = pair();
        self.outcomes.lock().await.push_back(Ok(client));
        server
    }

    /// Queues a failed connection attempt.
    pub async fn fail_next(&self, error: MuxError) {
        self.outcomes.lock().await.push_back(Err(error));
    }

    /// Returns every token `connect` was called with, oldest first.
    pub async fn tokens(&self) -> Vec<String> {
        self.tokens.lock().await.clone()
    }
}

impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    async fn connect(&self, token: &str) -> Result<MemoryTransport, MuxError> {
        self.tokens.lock().await.push(token.to_string());
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(MuxError::Transport("connection refused".to_string())))
    }
}
