//! Subscriber lists for event and status fan-out.
//!
//! Subscriptions are explicit callback handles keyed by a token; dropping or
//! passing the token back unsubscribes. Delivery is synchronous in arrival
//! order, and a failing handler is logged without interrupting delivery to
//! the remaining handlers.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// An unsolicited event pushed by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
    /// Event name, e.g. `agent.run`
    pub event: String,
    /// Event payload
    pub payload: Value,
}

/// Connection status of a gateway client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Dialing or waiting for the socket to open
    Connecting,
    /// Socket open, requests may be issued
    Connected,
    /// Socket closed (intentionally or waiting for a reconnect)
    Disconnected,
    /// Last dial attempt failed
    Error,
}

/// A status transition reported to status subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// The status after the transition
    pub status: ConnectionStatus,
    /// Close or error reason supplied by the peer, when known
    pub reason: Option<String>,
}

/// Handle returned by a subscribe call; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

type Handler<T> =
    Arc<dyn Fn(&T) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// A keyed list of callbacks with per-handler fault isolation.
pub(crate) struct SubscriberSet<T> {
    inner: Mutex<Handlers<T>>,
    what: &'static str,
}

struct Handlers<T> {
    next_token: u64,
    // BTreeMap keeps dispatch in subscription order.
    handlers: BTreeMap<u64, Handler<T>>,
}

impl<T> SubscriberSet<T> {
    pub(crate) fn new(what: &'static str) -> Self {
        Self {
            inner: Mutex::new(Handlers {
                next_token: 0,
                handlers: BTreeMap::new(),
            }),
            what,
        }
    }

    fn inner(&self) -> MutexGuard<'_, Handlers<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        let mut inner = self.inner();
        let token = inner.next_token;
        inner.next_token += 1;
        inner.handlers.insert(token, Arc::new(handler));
        Subscription(token)
    }

    pub(crate) fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.inner().handlers.remove(&subscription.0).is_some()
    }

    /// Deliver `item` to every current subscriber, in subscription order.
    pub(crate) fn dispatch(&self, item: &T) {
        // Handlers run outside the lock so a subscriber may unsubscribe
        // itself (or subscribe others) without deadlocking.
        let snapshot: Vec<(u64, Handler<T>)> = self
            .inner()
            .handlers
            .iter()
            .map(|(token, handler)| (*token, Arc::clone(handler)))
            .collect();
        for (token, handler) in snapshot {
            if let Err(error) = handler(item) {
                warn!(what = self.what, token, %error, "subscriber failed, continuing delivery");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner().handlers.len()
    }
}
