//! Transport counters.
//!
//! Scalar, cardinality-safe counters for monitoring one client's health.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters maintained by a gateway client.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    requests_sent: AtomicU64,
    responses_matched: AtomicU64,
    request_timeouts: AtomicU64,
    events_delivered: AtomicU64,
    reconnects_scheduled: AtomicU64,
}

/// Point-in-time copy of [`GatewayMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GatewayMetricsSnapshot {
    pub requests_sent: u64,
    pub responses_matched: u64,
    pub request_timeouts: u64,
    pub events_delivered: u64,
    pub reconnects_scheduled: u64,
}

impl GatewayMetrics {
    pub(crate) fn record_request(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_response(&self) {
        self.responses_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.request_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_event(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> GatewayMetricsSnapshot {
        GatewayMetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            responses_matched: self.responses_matched.load(Ordering::Relaxed),
            request_timeouts: self.request_timeouts.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
        }
    }
}
