//! # Weft Core
//!
//! Shared building blocks for the Weft runtime core: validated identifier
//! newtypes, the gateway wire-message frames, and the reconnect backoff
//! policy used by the transport layer.

pub mod backoff;
pub mod identifiers;
pub mod protocol;

pub use backoff::ReconnectPolicy;
pub use identifiers::{GraphId, IdValidationError, NodeId, RunId, SessionKey};
pub use protocol::{ProtocolError, WireMessage};
