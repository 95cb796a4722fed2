//! Lifecycle events consumed from the gateway's push stream.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use weft_core::RunId;

/// Gateway event name carrying run phase changes.
pub const RUN_EVENT: &str = "agent.run";
/// The only phase the registry acts on.
pub const PHASE_END: &str = "end";

/// A phase change for one tracked run.
#[derive(Debug, Clone)]
pub struct RunPhaseEvent {
    pub run_id: RunId,
    pub phase: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub aborted: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePhaseEvent {
    #[serde(rename = "runId")]
    run_id: RunId,
    #[serde(default)]
    data: WirePhaseData,
}

#[derive(Debug, Default, Deserialize)]
struct WirePhaseData {
    #[serde(default)]
    phase: String,
    #[serde(rename = "startedAt")]
    started_at: Option<i64>,
    #[serde(rename = "endedAt")]
    ended_at: Option<i64>,
    #[serde(default)]
    aborted: bool,
    error: Option<String>,
}

impl RunPhaseEvent {
    /// Parse a phase event from a gateway event payload. Malformed payloads
    /// are logged and discarded.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        match serde_json::from_value::<WirePhaseEvent>(payload.clone()) {
            Ok(wire) => Some(Self {
                run_id: wire.run_id,
                phase: wire.data.phase,
                started_at: wire.data.started_at.and_then(DateTime::from_timestamp_millis),
                ended_at: wire.data.ended_at.and_then(DateTime::from_timestamp_millis),
                aborted: wire.data.aborted,
                error: wire.data.error,
            }),
            Err(error) => {
                debug!(%error, "discarding malformed run phase event");
                None
            }
        }
    }

    /// Whether this event reports the run's end.
    pub fn is_end(&self) -> bool {
        self.phase == PHASE_END
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_end_phase_payload() {
        let event = RunPhaseEvent::from_payload(&json!({
            "runId": "r1",
            "data": {
                "phase": "end",
                "startedAt": 1_000,
                "endedAt": 5_000,
                "aborted": false,
            }
        }))
        .unwrap();
        assert!(event.is_end());
        assert_eq!(event.run_id.as_str(), "r1");
        assert_eq!(
            event.ended_at.unwrap().timestamp_millis() - event.started_at.unwrap().timestamp_millis(),
            4_000
        );
        assert!(!event.aborted);
    }

    #[test]
    fn malformed_payload_is_discarded() {
        assert!(RunPhaseEvent::from_payload(&json!({"data": {}})).is_none());
        assert!(RunPhaseEvent::from_payload(&json!("nope")).is_none());
    }

    #[test]
    fn missing_data_defaults_to_non_end() {
        let event = RunPhaseEvent::from_payload(&json!({"runId": "r2"})).unwrap();
        assert!(!event.is_end());
        assert!(!event.aborted);
    }
}
