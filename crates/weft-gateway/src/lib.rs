//! # Weft Gateway
//!
//! Reconnecting WebSocket RPC transport for the Weft runtime core.
//!
//! A [`GatewayClient`] owns one logical duplex connection to the gateway.
//! It provides:
//!
//! - **Correlated request/response calls**: every call gets a unique
//!   correlation id, its own continuation, and a fixed timeout; concurrent
//!   calls never interfere
//! - **Event subscriptions**: server pushes fan out synchronously, in
//!   arrival order, with per-subscriber fault isolation
//! - **Automatic reconnect**: unexpected closes schedule capped exponential
//!   backoff; an explicit [`GatewayClient::disconnect`] is terminal
//! - **Challenge handshake**: the server's identity challenge is answered
//!   automatically, outside the correlation table
//!
//! ## Example
//!
//! ```rust,no_run
//! use weft_gateway::{GatewayClient, GatewayConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GatewayClient::new(GatewayConfig::new("ws://127.0.0.1:4500"));
//!     client.connect().await?;
//!
//!     let subscription = client.on_event(|event| {
//!         println!("event: {}", event.event);
//!         Ok(())
//!     });
//!
//!     let reply = client.request("agent.spawn", json!({"task": "summarize"})).await?;
//!     println!("spawned: {reply}");
//!
//!     client.off_event(subscription);
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod metrics;
mod pending;
mod subscribers;

pub use client::GatewayClient;
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use metrics::{GatewayMetrics, GatewayMetricsSnapshot};
pub use subscribers::{ConnectionStatus, GatewayEvent, StatusChange, Subscription};
