//! Error types for gateway operations

use std::time::Duration;
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

fn window(timeout: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*timeout)
}

/// Errors that can occur on the gateway connection
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A call was issued while the socket is not open
    #[error("not connected")]
    NotConnected,

    /// No response arrived within the request window
    #[error("request {method} timed out after {}", window(.timeout))]
    RequestTimeout { method: String, timeout: Duration },

    /// The server answered the request with an error
    #[error("remote error: {0}")]
    Remote(String),

    /// The connection was closed by an explicit `disconnect()` while the
    /// request was in flight
    #[error("client disconnected")]
    Disconnected,

    /// Dial or write failure on the underlying socket
    #[error("transport error: {0}")]
    Transport(String),

    /// Outbound frame could not be encoded
    #[error(transparent)]
    Protocol(#[from] weft_core::ProtocolError),
}
