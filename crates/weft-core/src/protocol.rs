//! Wire message frames for the gateway connection.
//!
//! Every frame on the wire is a JSON object distinguished by its `type`
//! field. The three variants are modeled as a tagged enum so malformed
//! payloads are rejected at the boundary instead of leaking `Value` maps
//! through the transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single frame exchanged over the gateway connection.
///
/// - `Req` carries an RPC call and its correlation id
/// - `Res` answers exactly one `Req` by id
/// - `Event` is an unsolicited server push with no correlation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    /// Request frame: `{"type":"req","id":...,"method":...,"params":...}`
    Req {
        id: String,
        method: String,
        #[serde(default)]
        params: Value,
    },
    /// Response frame: `{"type":"res","id":...,"ok":...,"payload"?,"error"?}`
    Res {
        id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Event frame: `{"type":"event","event":...,"payload":...}`
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

/// Errors for frame encoding/decoding
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Inbound bytes were not a valid frame
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl WireMessage {
    /// Build a request frame.
    pub fn request(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        WireMessage::Req {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Build an event frame.
    pub fn event(event: impl Into<String>, payload: Value) -> Self {
        WireMessage::Event {
            event: event.into(),
            payload,
        }
    }

    /// Serialize the frame to its wire representation.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a frame from its wire representation.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}
