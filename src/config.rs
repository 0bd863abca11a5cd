//! Multiplexer configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Library users that do not want the
//! environment involved start from [`MuxConfig::default`] and adjust it with
//! the `with_*` builders.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::MuxError;

/// Default socket endpoint.
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:4000/socket/websocket";

const DEFAULT_PUSH_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level multiplexer configuration.
///
/// Loaded once at startup via [`MuxConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxConfig {
    /// Socket endpoint, `ws://` or `wss://` (`http(s)` is rewritten).
    pub socket_url: String,

    /// How long a join, leave or push waits for its reply.
    pub push_timeout: Duration,

    /// How long opening the transport may take.
    pub connect_timeout: Duration,

    /// Heartbeat period; `None` disables heartbeats.
    pub heartbeat_interval: Option<Duration>,

    /// Log output format.
    pub log_format: LogFormat,

    /// Optional JSON file backing the key/value store.
    pub token_store_path: Option<PathBuf>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            push_timeout: Duration::from_millis(DEFAULT_PUSH_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            heartbeat_interval: Some(Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS)),
            log_format: LogFormat::Text,
            token_store_path: None,
        }
    }
}

impl MuxConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or unparsable.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::InvalidConfig`] if `SOCKET_URL` is set but is
    /// not a valid URL.
    pub fn from_env() -> Result<Self, MuxError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::InvalidConfig`] if `SOCKET_URL` is not a valid URL.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MuxError> {
        let socket_url = lookup("SOCKET_URL").unwrap_or_else(|| DEFAULT_SOCKET_URL.to_string());
        Url::parse(&socket_url)
            .map_err(|e| MuxError::InvalidConfig(format!("SOCKET_URL {socket_url:?}: {e}")))?;

        let push_timeout = Duration::from_millis(parse_var(
            &lookup,
            "PUSH_TIMEOUT_MS",
            DEFAULT_PUSH_TIMEOUT_MS,
        ));
        let connect_timeout = Duration::from_millis(parse_var(
            &lookup,
            "CONNECT_TIMEOUT_MS",
            DEFAULT_CONNECT_TIMEOUT_MS,
        ));
        let heartbeat_ms = parse_var(
            &lookup,
            "HEARTBEAT_INTERVAL_MS",
            DEFAULT_HEARTBEAT_INTERVAL_MS,
        );
        let heartbeat_interval = (heartbeat_ms > 0).then(|| Duration::from_millis(heartbeat_ms));

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let token_store_path = lookup("TOKEN_STORE_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            socket_url,
            push_timeout,
            connect_timeout,
            heartbeat_interval,
            log_format,
            token_store_path,
        })
    }

    /// Sets the socket endpoint.
    #[must_use]
    pub fn with_socket_url(mut self, url: impl Into<String>) -> Self {
        self.socket_url = url.into();
        self
    }

    /// Sets the reply timeout.
    #[must_use]
    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    /// Sets the transport open timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the heartbeat period; `None` disables heartbeats.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the key/value store file.
    #[must_use]
    pub fn with_token_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_store_path = Some(path.into());
        self
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
