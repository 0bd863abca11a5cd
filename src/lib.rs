//! # topic-mux
//!
//! Topic-channel multiplexer over a single Phoenix-style WebSocket
//! connection.
//!
//! One socket carries many logical topics. This crate manages the
//! subscription lifecycle of each topic, routes inbound events to the host
//! application, reconciles presence state, and tears everything down
//! cleanly when the socket closes.
//!
//! ## Architecture
//!
//! ```text
//! Host application
//!     │  MuxClient commands          ▲ HostEvent stream
//!     ▼                              │
//! ConnectionManager (session/) ──────┤
//!     │
//!     ├── Multiplexer (session/)
//!     │     ├── TopicRegistry (domain/)
//!     │     ├── MessageRouter (session/)
//!     │     └── PresenceTracker (domain/)
//!     │
//!     └── Transport (transport/)
//!           ├── WsConnector (tokio-tungstenite)
//!           └── MemoryConnector (in-process)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use topic_mux::config::MuxConfig;
//! use topic_mux::session::MuxClient;
//! use topic_mux::transport::websocket::WsConnector;
//!
//! # async fn run() -> Result<(), topic_mux::error::MuxError> {
//! let config = MuxConfig::default();
//! let connector = WsConnector::new(&config.socket_url)?;
//! let (client, mut events) = MuxClient::start(connector, &config);
//! client.connect("token")?;
//! client.join_topic("room:lobby")?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod protocol;
pub mod session;
pub mod transport;
