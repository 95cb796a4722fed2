//! Reconnect backoff policy.
//!
//! Pure mapping from attempt number to delay. The transport consults this on
//! every unexpected disconnect; jitter spreads simultaneous reconnects from
//! many clients.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_INITIAL_MS: u64 = 1_000;
const DEFAULT_MAX_MS: u64 = 30_000;
const DEFAULT_FACTOR: f64 = 2.0;
const DEFAULT_JITTER: f64 = 0.1;

/// Exponential backoff schedule with a cap and optional jitter.
///
/// Delay formula: `min(initial * factor^attempt, max)` plus a uniform random
/// jitter in `[0, capped * jitter)`. A jitter factor of `0.0` makes the
/// schedule exact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt, in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    /// Multiplier applied per attempt
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Jitter factor (0.0 - 1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_initial_ms() -> u64 {
    DEFAULT_INITIAL_MS
}

fn default_max_ms() -> u64 {
    DEFAULT_MAX_MS
}

fn default_factor() -> f64 {
    DEFAULT_FACTOR
}

fn default_jitter() -> f64 {
    DEFAULT_JITTER
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_ms: DEFAULT_INITIAL_MS,
            max_ms: DEFAULT_MAX_MS,
            factor: DEFAULT_FACTOR,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl ReconnectPolicy {
    /// Policy without jitter, useful when the schedule must be exact.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Compute the delay before reconnect attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = (self.initial_ms as f64) * self.factor.powf(f64::from(attempt));
        let capped = if exponential.is_finite() {
            (exponential as u64).min(self.max_ms)
        } else {
            self.max_ms
        };

        let jitter_ms = if self.jitter > 0.0 {
            let range = (capped as f64) * self.jitter;
            rand::rng().random_range(0.0..range.max(f64::MIN_POSITIVE)).floor() as u64
        } else {
            0
        };

        Duration::from_millis(capped.saturating_add(jitter_ms))
    }
}
