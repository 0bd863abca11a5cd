//! topic-mux command-line driver.
//!
//! Connects to the configured socket, joins every topic in `JOIN_TOPICS`
//! and logs host events until Ctrl-C.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use topic_mux::config::{LogFormat, MuxConfig};
use topic_mux::domain::{ConnectionState, HostEvent};
use topic_mux::persistence::{JsonFileStore, KeyValueStore, MemoryStore, SessionStore};
use topic_mux::session::MuxClient;
use topic_mux::transport::websocket::WsConnector;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = MuxConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let token = match &config.token_store_path {
        Some(path) => stored_token(
            JsonFileStore::open(path)
                .with_context(|| format!("opening store {}", path.display()))?,
        )?,
        None => stored_token(MemoryStore::new())?,
    };
    let token = token
        .or_else(|| std::env::var("SOCKET_TOKEN").ok())
        .unwrap_or_default();
    if token.is_empty() {
        tracing::warn!("no credential found, connecting without token");
    }

    let topics: Vec<String> = std::env::var("JOIN_TOPICS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    let connector = WsConnector::new(&config.socket_url).context("building connector")?;
    tracing::info!(url = %config.socket_url, topics = topics.len(), "starting topic-mux");
    let (client, mut events) = MuxClient::start(connector, &config);
    client.connect(token)?;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if event == HostEvent::SocketOpened {
                    for topic in &topics {
                        client.join_topic(topic.as_str())?;
                    }
                }
                log_event(&event);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                client.disconnect()?;
                client
                    .wait_for_state(ConnectionState::Disconnected)
                    .await?;
                break;
            }
        }
    }

    Ok(())
}

/// Reads the refresh token from a store.
fn stored_token(store: impl KeyValueStore) -> anyhow::Result<Option<String>> {
    SessionStore::new(store)
        .refresh_token()
        .context("reading refresh token")
}

fn log_event(event: &HostEvent) {
    match event {
        HostEvent::MessageReceived(envelope) => tracing::info!(
            topic = %envelope.topic,
            event = %envelope.event,
            payload = %envelope.payload,
            "message"
        ),
        HostEvent::PresenceUpdated { topic, state } => tracing::info!(
            %topic,
            present = ?state.identities().collect::<Vec<_>>(),
            "presence"
        ),
        HostEvent::ConnectionFailed { error } => tracing::error!(%error, "connection failed"),
        other => tracing::info!(
            event = other.event_type_str(),
            topic = ?other.topic(),
            "host event"
        ),
    }
}
