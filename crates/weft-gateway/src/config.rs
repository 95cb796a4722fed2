//! Configuration for the gateway client.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use weft_core::ReconnectPolicy;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Configuration for a [`GatewayClient`](crate::GatewayClient)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// WebSocket URL of the gateway (`ws://...` or `wss://...`)
    pub url: String,
    /// Optional auth token echoed during the connect handshake
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Window for each request/response exchange, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Backoff schedule applied between reconnect attempts
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl GatewayConfig {
    /// Create a configuration with defaults for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Set the handshake auth token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the request window.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Override the reconnect backoff schedule.
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// The request window as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
