//! HTTP listener and WebSocket streaming settings.

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use super::error::ValidationError;

/// Upper bound on the buffered-request timeout.
const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Frames queued per connection before the pipeline waits on the socket.
const MAX_OUTBOUND_FRAMES: usize = 4096;

/// Smallest inbound frame limit that still fits a maximal chat message.
const MIN_INBOUND_FRAME_BYTES: usize = 48 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,

    /// Tracing filter directive; `RUST_LOG` wins when set.
    pub log_level: String,

    /// Deadline for buffered requests. Streaming sessions are bounded by
    /// the pipeline timeouts instead.
    pub request_timeout_secs: u64,

    /// Comma-separated allowed origins. Empty means permissive outside
    /// production and same-origin only in production.
    pub cors_origins: Option<String>,

    /// Frames buffered between the pipeline and a WebSocket writer.
    pub ws_outbound_buffer: usize,

    /// Largest inbound WebSocket message accepted, in bytes.
    pub ws_max_message_bytes: usize,
}

/// Deployment environment. Production switches logs to JSON and closes CORS.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ValidationError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ValidationError::InvalidSocketAddress(addr))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if !(1..=MAX_REQUEST_TIMEOUT_SECS).contains(&self.request_timeout_secs) {
            return Err(ValidationError::InvalidTimeout);
        }
        if !(1..=MAX_OUTBOUND_FRAMES).contains(&self.ws_outbound_buffer) {
            return Err(ValidationError::InvalidStreaming("ws_outbound_buffer"));
        }
        if self.ws_max_message_bytes < MIN_INBOUND_FRAME_BYTES {
            return Err(ValidationError::InvalidStreaming("ws_max_message_bytes"));
        }
        self.socket_addr().map(|_| ())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: Environment::default(),
            log_level: "info,aqua_sherpa=debug,sqlx=warn".to_string(),
            request_timeout_secs: 120,
            cors_origins: None,
            ws_outbound_buffer: 64,
            ws_max_message_bytes: 64 * 1024,
        }
    }
}
