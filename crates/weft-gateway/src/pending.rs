//! In-flight request table.
//!
//! One entry per outstanding RPC call, keyed by correlation id. An entry is
//! removed when its response arrives, when its window elapses, or when the
//! connection is intentionally closed (which fails every entry).

use crate::error::GatewayError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::debug;

type Continuation = oneshot::Sender<Result<Value, GatewayError>>;

/// Table of pending requests, owned exclusively by the transport.
#[derive(Default)]
pub(crate) struct PendingRequests {
    entries: Mutex<HashMap<String, Continuation>>,
}

impl PendingRequests {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Continuation>> {
        // A poisoned lock only means a panic elsewhere; the table itself is
        // still consistent (single-operation critical sections).
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new in-flight call and return the receiving half.
    pub(crate) fn register(&self, id: &str) -> oneshot::Receiver<Result<Value, GatewayError>> {
        let (tx, rx) = oneshot::channel();
        self.entries().insert(id.to_string(), tx);
        rx
    }

    /// Remove an entry without settling it (timeout and write-failure paths).
    pub(crate) fn forget(&self, id: &str) {
        self.entries().remove(id);
    }

    /// Settle the entry matching `id`, if any. A response whose id has no
    /// matching entry is ignored.
    pub(crate) fn settle(&self, id: &str, result: Result<Value, GatewayError>) {
        match self.entries().remove(id) {
            Some(tx) => {
                if tx.send(result).is_err() {
                    debug!(id, "pending request dropped before response arrived");
                }
            }
            None => debug!(id, "response for unknown request id, ignoring"),
        }
    }

    /// Fail every outstanding entry and clear the table.
    pub(crate) fn fail_all(&self, error: impl Fn() -> GatewayError) {
        let drained: Vec<(String, Continuation)> = self.entries().drain().collect();
        for (id, tx) in drained {
            if tx.send(Err(error())).is_err() {
                debug!(id, "pending request already gone while failing all");
            }
        }
    }

    /// Number of in-flight calls.
    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }
}
