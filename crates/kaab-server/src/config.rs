//! Server configuration.

use kaab_settings::ServerSettings;
use serde::{Deserialize, Serialize};

use crate::realtime::SessionLimits;

/// Listener and transport configuration for [`KaabServer`](crate::server::KaabServer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection.
    pub outbound_queue: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without a pong.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 64 * 1024,
            outbound_queue: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}

impl ServerConfig {
    /// Take listener settings from the loaded settings file.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_message_size: settings.max_message_size,
            outbound_queue: settings.outbound_queue,
            heartbeat_interval_secs: settings.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.heartbeat_timeout_secs,
        }
    }

    /// Limits handed to each WebSocket session.
    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            outbound_queue: self.outbound_queue,
            heartbeat_interval: std::time::Duration::from_secs(self.heartbeat_interval_secs.max(1)),
            heartbeat_timeout: std::time::Duration::from_secs(self.heartbeat_timeout_secs),
        }
    }
}
