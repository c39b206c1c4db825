//! Hub configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::time::Duration;

use crate::hub::DEFAULT_BROADCAST_BACKLOG;

/// Default per-client delivery channel capacity.
pub const DEFAULT_CLIENT_BUFFER_CAPACITY: usize = 256;

/// Top-level service configuration.
///
/// Loaded once at startup via [`HubConfig::from_env`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Number of undelivered messages a client may have queued before the
    /// hub evicts it.
    pub client_buffer_capacity: usize,

    /// Period between keep-alive pings sent to each WebSocket client.
    pub ping_interval: Duration,

    /// Largest inbound WebSocket message accepted from a client, in bytes.
    pub max_message_bytes: usize,

    /// Broadcasts allowed to wait for the dispatch loop before producers
    /// are refused.
    pub broadcast_backlog: usize,
}

impl HubConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let client_buffer_capacity =
            parse_env("CLIENT_BUFFER_CAPACITY", DEFAULT_CLIENT_BUFFER_CAPACITY).max(1);
        let ping_interval = Duration::from_secs(parse_env("WS_PING_INTERVAL_SECS", 54_u64).max(1));
        let max_message_bytes = parse_env("WS_MAX_MESSAGE_BYTES", 512);
        let broadcast_backlog =
            parse_env("HUB_BROADCAST_BACKLOG", DEFAULT_BROADCAST_BACKLOG).max(1);

        Ok(Self {
            listen_addr,
            client_buffer_capacity,
            ping_interval,
            max_message_bytes,
            broadcast_backlog,
        })
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            client_buffer_capacity: DEFAULT_CLIENT_BUFFER_CAPACITY,
            ping_interval: Duration::from_secs(54),
            max_message_bytes: 512,
            broadcast_backlog: DEFAULT_BROADCAST_BACKLOG,
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
