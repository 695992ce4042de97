//! Settings schema.
//!
//! Every section is `#[serde(default)]`, so a settings file only needs the
//! keys it wants to change. Keys are camelCase on disk.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KaabSettings {
    /// HTTP / WebSocket listener.
    pub server: ServerSettings,
    /// Response engine and cache.
    pub assistant: AssistantSettings,
    /// Gemini generative model.
    pub gemini: GeminiSettings,
    /// Public site identity used in assistant answers.
    pub site: SiteSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Listener and per-connection limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Largest accepted inbound WebSocket frame, in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per connection.
    pub outbound_queue: usize,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before the connection is closed.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_message_size: 64 * 1024,
            outbound_queue: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}

impl ServerSettings {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Ping interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Pong deadline.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

/// Response engine tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantSettings {
    /// Age after which a cached response is no longer served.
    pub cache_ttl_secs: u64,
    /// Period of the background cache sweep.
    pub sweep_interval_secs: u64,
    /// Identical consecutive turns closer than this collapse into one.
    pub duplicate_window_ms: u64,
    /// Deadline for one generative-model call.
    pub model_timeout_ms: u64,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            sweep_interval_secs: 60,
            duplicate_window_ms: 1000,
            model_timeout_ms: 10_000,
        }
    }
}

impl AssistantSettings {
    /// Cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Sweep period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Duplicate-turn window.
    pub fn duplicate_window(&self) -> Duration {
        Duration::from_millis(self.duplicate_window_ms)
    }

    /// Model call deadline.
    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }
}

/// Gemini endpoint and credential.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeminiSettings {
    /// Model name, e.g. `gemini-1.5-flash`.
    pub model: String,
    /// API root up to and including the version segment.
    pub base_url: String,
    /// API key. Never written back to disk.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
        }
    }
}

/// Public site identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteSettings {
    /// Product name as it appears in answers.
    pub name: String,
    /// Prefix for navigation links. Empty yields root-relative links.
    pub base_url: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            name: "KaabHub".to_string(),
            base_url: String::new(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
