//! WebSocket transport over `tokio-tungstenite`.
//!
//! The credential and protocol version travel as query parameters
//! (`?token=..&vsn=2.0.0`), the way Phoenix sockets expect them.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::{Connector, Transport};
use crate::error::MuxError;
use crate::protocol::PROTOCOL_VSN;

/// Concrete WebSocket stream type.
type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Opens WebSocket connections to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
}

impl WsConnector {
    /// Creates a connector for `url`; `http(s)` schemes become `ws(s)`.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::InvalidConfig`] if the URL cannot be parsed or
    /// its scheme is not one of `ws`, `wss`, `http`, `https`.
    pub fn new(url: &str) -> Result<Self, MuxError> {
        let mut url =
            Url::parse(url).map_err(|e| MuxError::InvalidConfig(format!("socket url: {e}")))?;
        let scheme = match url.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            other => {
                return Err(MuxError::InvalidConfig(format!(
                    "unsupported socket scheme: {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| MuxError::InvalidConfig("cannot set socket scheme".to_string()))?;
        Ok(Self { url })
    }

    /// Returns the URL a connection with `token` will open.
    #[must_use]
    pub fn endpoint(&self, token: &str) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("token", token)
            .append_pair("vsn", PROTOCOL_VSN);
        url
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, token: &str) -> Result<WsTransport, MuxError> {
        let endpoint = self.endpoint(token);
        tracing::debug!(host = endpoint.host_str().unwrap_or_default(), "opening websocket");
        let (stream, _response) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .map_err(|e| MuxError::Transport(format!("websocket connect failed: {e}")))?;
        let (sink, stream) = stream.split();
        Ok(WsTransport { sink, stream })
    }
}

/// An open WebSocket connection.
#[derive(Debug)]
pub struct WsTransport {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), MuxError> {
        self.sink
            .send(Message::text(text))
            .await
            .map_err(|e| MuxError::Transport(format!("websocket send failed: {e}")))
    }

    async fn recv(&mut self) -> Option<Result<String, MuxError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => tracing::warn!(len = data.len(), "dropping non-utf8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "websocket closed by peer");
                    return None;
                }
                // Pings are answered by tungstenite on the next read or write.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => {
                    return Some(Err(MuxError::Transport(format!(
                        "websocket read error: {e}"
                    ))));
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), MuxError> {
        self.sink
            .close()
            .await
            .map_err(|e| MuxError::Transport(format!("websocket close failed: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_carries_token_and_version() {
        let Ok(connector) = WsConnector::new("ws://localhost:4000/socket/websocket") else {
            panic!("valid url");
        };
        let url = connector.endpoint("a b&c");
        assert_eq!(
            url.as_str(),
            "ws://localhost:4000/socket/websocket?token=a+b%26c&vsn=2.0.0"
        );
    }

    #[test]
    fn http_scheme_becomes_ws() {
        let Ok(connector) = WsConnector::new("https://example.com/socket/websocket") else {
            panic!("valid url");
        };
        assert_eq!(connector.endpoint("t").scheme(), "wss");
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(matches!(
            WsConnector::new("ftp://example.com"),
            Err(MuxError::InvalidConfig(_))
        ));
        assert!(WsConnector::new("not a url").is_err());
    }
}
