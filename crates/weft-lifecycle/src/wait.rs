//! The `agent.wait` polling seam.
//!
//! The registry polls the gateway for run completion through this trait so
//! tests can substitute a mock and the event-driven path never depends on a
//! live connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use weft_core::RunId;
use weft_gateway::{GatewayClient, GatewayError};

/// Upper bound on a single wait window, matching the gateway's own cap.
pub(crate) const MAX_WAIT_WINDOW: Duration = Duration::from_secs(60);
/// Grace added on top of the wait window for the RPC round trip itself.
const RPC_GRACE: Duration = Duration::from_secs(2);

/// Status reported by a resolved wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Ok,
    Timeout,
    Error,
}

/// Resolution of one `agent.wait` poll.
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    pub status: WaitStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl WaitOutcome {
    pub fn ok() -> Self {
        Self {
            status: WaitStatus::Ok,
            started_at: None,
            ended_at: None,
            error: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            status: WaitStatus::Timeout,
            started_at: None,
            ended_at: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: WaitStatus::Error,
            started_at: None,
            ended_at: None,
            error: Some(message.into()),
        }
    }
}

/// Poll the coordinator for a run's completion.
///
/// Implementations never fail: transport problems resolve to a best-effort
/// [`WaitOutcome`].
#[async_trait]
pub trait AgentWait: Send + Sync {
    async fn wait_for_run(&self, run_id: &RunId, timeout: Duration) -> WaitOutcome;
}

#[derive(Debug, Deserialize)]
struct WaitReply {
    status: String,
    #[serde(rename = "startedAt")]
    started_at: Option<i64>,
    #[serde(rename = "endedAt")]
    ended_at: Option<i64>,
    error: Option<String>,
}

#[async_trait]
impl AgentWait for GatewayClient {
    async fn wait_for_run(&self, run_id: &RunId, timeout: Duration) -> WaitOutcome {
        let window = timeout.min(MAX_WAIT_WINDOW);
        let params = json!({
            "runId": run_id.as_str(),
            "timeoutMs": window.as_millis() as u64,
        });

        match self
            .request_with_timeout("agent.wait", params, window + RPC_GRACE)
            .await
        {
            Ok(payload) => match serde_json::from_value::<WaitReply>(payload) {
                Ok(reply) => {
                    let status = match reply.status.as_str() {
                        "ok" => WaitStatus::Ok,
                        "timeout" => WaitStatus::Timeout,
                        other => {
                            debug!(run_id = %run_id, status = other, "unexpected wait status");
                            WaitStatus::Error
                        }
                    };
                    WaitOutcome {
                        status,
                        started_at: reply.started_at.and_then(DateTime::from_timestamp_millis),
                        ended_at: reply.ended_at.and_then(DateTime::from_timestamp_millis),
                        error: reply.error.or_else(|| {
                            (status == WaitStatus::Error)
                                .then(|| format!("unexpected wait status: {}", reply.status))
                        }),
                    }
                }
                Err(error) => WaitOutcome::error(format!("malformed wait reply: {error}")),
            },
            Err(GatewayError::RequestTimeout { .. }) => WaitOutcome::timeout(),
            Err(error) => WaitOutcome::error(error.to_string()),
        }
    }
}
