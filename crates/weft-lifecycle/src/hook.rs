//! Completion hook payload and sink trait.
//!
//! The registry emits exactly one [`HookEvent`] per tracked run, no matter
//! how many completion signals race for it.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use weft_core::{RunId, SessionKey};

/// What happened to the run, from the winning signal's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// The run finished normally
    Complete,
    /// The bounded wait elapsed before the run finished
    Timeout,
    /// The run was aborted or failed
    Killed,
}

impl HookAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookAction::Complete => "complete",
            HookAction::Timeout => "timeout",
            HookAction::Killed => "killed",
        }
    }
}

/// Final status reported inside the hook outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Ok,
    Timeout,
    Error,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Ok => "ok",
            OutcomeStatus::Timeout => "timeout",
            OutcomeStatus::Error => "error",
        }
    }
}

/// Outcome of the run as reported by the winning signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: OutcomeStatus,
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn ok() -> Self {
        Self {
            status: OutcomeStatus::Ok,
            error: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            status: OutcomeStatus::Timeout,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            error: Some(message.into()),
        }
    }
}

/// The exactly-once notification for one tracked run.
#[derive(Debug, Clone)]
pub struct HookEvent {
    pub action: HookAction,
    /// Requester session the notification is addressed to
    pub session_key: SessionKey,
    pub run_id: RunId,
    pub child_session_key: SessionKey,
    pub task: String,
    pub outcome: RunOutcome,
    pub reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub runtime_ms: Option<i64>,
}

impl HookEvent {
    /// Render the hook in its wire shape for external sinks.
    pub fn to_payload(&self) -> Value {
        let mut context = json!({
            "childSessionKey": self.child_session_key.as_str(),
            "runId": self.run_id.as_str(),
            "task": self.task,
            "outcome": {
                "status": self.outcome.status.as_str(),
                "error": self.outcome.error,
            },
            "reason": self.reason,
        });
        if let Some(started_at) = self.started_at {
            context["startedAt"] = json!(started_at.timestamp_millis());
        }
        if let Some(ended_at) = self.ended_at {
            context["endedAt"] = json!(ended_at.timestamp_millis());
        }
        if let Some(runtime_ms) = self.runtime_ms {
            context["runtimeMs"] = json!(runtime_ms);
        }
        json!({
            "type": "subagent",
            "action": self.action.as_str(),
            "sessionKey": self.session_key.as_str(),
            "context": context,
        })
    }
}

/// Sink for completion notifications.
///
/// Invoked synchronously from whichever signal path wins the race; the
/// implementation must not block for long.
pub trait CompletionHook: Send + Sync {
    fn on_run_complete(&self, event: &HookEvent);
}

impl<F> CompletionHook for F
where
    F: Fn(&HookEvent) + Send + Sync,
{
    fn on_run_complete(&self, event: &HookEvent) {
        self(event)
    }
}

/// Short human-readable runtime for log lines: "2h3m", "3m12s", "45s".
pub(crate) fn format_runtime_short(runtime_ms: i64) -> String {
    if runtime_ms <= 0 {
        return "0s".to_string();
    }
    let total_seconds = (runtime_ms + 500) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape_matches_sink_contract() {
        let event = HookEvent {
            action: HookAction::Killed,
            session_key: SessionKey::new_unchecked("main"),
            run_id: RunId::new_unchecked("r1"),
            child_session_key: SessionKey::new_unchecked("agent.child"),
            task: "summarize".to_string(),
            outcome: RunOutcome::error("manual-stop"),
            reason: Some("operator request".to_string()),
            started_at: DateTime::from_timestamp_millis(1_000),
            ended_at: DateTime::from_timestamp_millis(4_000),
            runtime_ms: Some(3_000),
        };
        let payload = event.to_payload();
        assert_eq!(payload["type"], "subagent");
        assert_eq!(payload["action"], "killed");
        assert_eq!(payload["sessionKey"], "main");
        assert_eq!(payload["context"]["runId"], "r1");
        assert_eq!(payload["context"]["outcome"]["status"], "error");
        assert_eq!(payload["context"]["outcome"]["error"], "manual-stop");
        assert_eq!(payload["context"]["runtimeMs"], 3_000);
    }

    #[test]
    fn runtime_formatting() {
        assert_eq!(format_runtime_short(0), "0s");
        assert_eq!(format_runtime_short(45_000), "45s");
        assert_eq!(format_runtime_short(192_000), "3m12s");
        assert_eq!(format_runtime_short(7_380_000), "2h3m");
    }
}
