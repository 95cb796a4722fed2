//! Run registry with the exactly-once completion hook.
//!
//! Three signals race to report a run's completion: the gateway's lifecycle
//! event stream, the `agent.wait` poll, and administrative termination.
//! Whichever resolves first wins the compare-and-swap on the run's
//! `completion_emitted` flag and fires the hook; the losers are no-ops.

use crate::event::RunPhaseEvent;
use crate::hook::{CompletionHook, HookAction, HookEvent, RunOutcome, format_runtime_short};
use crate::wait::{AgentWait, WaitStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use weft_core::{RunId, SessionKey};
use weft_gateway::{GatewayClient, Subscription};

/// What to do with a run's registry entry after its hook has fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    /// Evict the entry once the hook has fired
    Delete,
    /// Retain the completed entry for later inspection
    Keep,
}

/// Everything the registry needs to track one spawned run.
#[derive(Debug, Clone)]
pub struct RunDescriptor {
    pub run_id: RunId,
    pub child_session_key: SessionKey,
    pub requester_session_key: SessionKey,
    pub task: String,
    pub cleanup: CleanupPolicy,
    /// When set, the registry also polls `agent.wait` for this run
    pub expects_completion_message: bool,
}

/// Registry tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Window passed to `agent.wait`, in milliseconds (capped at 60s)
    pub wait_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 60_000,
        }
    }
}

struct RegisteredRun {
    run_id: RunId,
    child_session_key: SessionKey,
    requester_session_key: SessionKey,
    task: String,
    cleanup: CleanupPolicy,
    registered_at: DateTime<Utc>,
    /// false→true exactly once; the winning transition emits the hook.
    completion_emitted: AtomicBool,
}

impl RegisteredRun {
    /// Try to win the completion race. Returns true for exactly one caller.
    fn claim(&self) -> bool {
        self.completion_emitted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

struct Inner {
    runs: DashMap<RunId, Arc<RegisteredRun>>,
    waiter: Arc<dyn AgentWait>,
    hook: Arc<dyn CompletionHook>,
    config: RegistryConfig,
}

/// Tracks spawned runs and fires the completion hook exactly once per run.
#[derive(Clone)]
pub struct RunRegistry {
    inner: Arc<Inner>,
}

impl RunRegistry {
    /// Create a registry emitting into `hook`, polling through `waiter`.
    pub fn new(waiter: Arc<dyn AgentWait>, hook: Arc<dyn CompletionHook>) -> Self {
        Self::with_config(waiter, hook, RegistryConfig::default())
    }

    /// Create a registry with explicit configuration.
    pub fn with_config(
        waiter: Arc<dyn AgentWait>,
        hook: Arc<dyn CompletionHook>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                runs: DashMap::new(),
                waiter,
                hook,
                config,
            }),
        }
    }

    /// Track a spawned run. When the descriptor expects a completion
    /// message, a bounded `agent.wait` poll starts concurrently.
    pub fn register_run(&self, descriptor: RunDescriptor) {
        let run = Arc::new(RegisteredRun {
            run_id: descriptor.run_id.clone(),
            child_session_key: descriptor.child_session_key,
            requester_session_key: descriptor.requester_session_key,
            task: descriptor.task,
            cleanup: descriptor.cleanup,
            registered_at: Utc::now(),
            completion_emitted: AtomicBool::new(false),
        });
        self.inner.runs.insert(descriptor.run_id.clone(), run);
        debug!(run_id = %descriptor.run_id, "registered run");

        if descriptor.expects_completion_message {
            let registry = self.clone();
            let run_id = descriptor.run_id;
            let window = Duration::from_millis(self.inner.config.wait_timeout_ms);
            tokio::spawn(async move {
                let outcome = registry.inner.waiter.wait_for_run(&run_id, window).await;
                registry.handle_wait_resolution(&run_id, outcome);
            });
        }
    }

    /// Feed one lifecycle event into the registry. Only `end` phases for
    /// tracked runs are actionable; everything else is ignored.
    ///
    /// This path completes its emission without ever waiting on the
    /// `agent.wait` poll.
    pub fn handle_run_event(&self, event: &RunPhaseEvent) {
        if !event.is_end() {
            return;
        }
        let Some(run) = self.lookup(&event.run_id) else {
            debug!(run_id = %event.run_id, "end event for untracked run, ignoring");
            return;
        };
        if !run.claim() {
            debug!(run_id = %event.run_id, "end event lost the completion race");
            return;
        }

        let (action, outcome, reason) = if event.aborted {
            let message = event.error.clone().unwrap_or_else(|| "aborted".to_string());
            (HookAction::Killed, RunOutcome::error(message), Some("aborted".to_string()))
        } else {
            (HookAction::Complete, RunOutcome::ok(), None)
        };
        let started_at = event.started_at.or(Some(run.registered_at));
        self.emit(&run, action, outcome, reason, started_at, event.ended_at);
    }

    /// Resolution of the `agent.wait` poll for a run. A lost race is a pure
    /// no-op: the faster path already emitted.
    fn handle_wait_resolution(&self, run_id: &RunId, outcome: crate::wait::WaitOutcome) {
        let Some(run) = self.lookup(run_id) else {
            debug!(run_id = %run_id, "wait resolved for untracked run, ignoring");
            return;
        };
        if !run.claim() {
            debug!(run_id = %run_id, "wait resolution lost the completion race");
            return;
        }

        let (action, hook_outcome, reason) = match outcome.status {
            WaitStatus::Ok => (HookAction::Complete, RunOutcome::ok(), None),
            WaitStatus::Timeout => (
                HookAction::Timeout,
                RunOutcome::timeout(),
                Some("wait window elapsed".to_string()),
            ),
            WaitStatus::Error => {
                let message = outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "agent wait failed".to_string());
                (HookAction::Killed, RunOutcome::error(message.clone()), Some(message))
            }
        };
        let started_at = outcome.started_at.or(Some(run.registered_at));
        self.emit(&run, action, hook_outcome, reason, started_at, outcome.ended_at);
    }

    /// Administrative override: report the run as killed with the given
    /// reason, unless a completion was already emitted.
    pub fn mark_run_terminated(&self, run_id: &RunId, reason: impl Into<String>) {
        let Some(run) = self.lookup(run_id) else {
            debug!(run_id = %run_id, "termination for untracked run, ignoring");
            return;
        };
        if !run.claim() {
            debug!(run_id = %run_id, "termination lost the completion race");
            return;
        }
        let reason = reason.into();
        self.emit(
            &run,
            HookAction::Killed,
            RunOutcome::error(reason.clone()),
            Some(reason),
            Some(run.registered_at),
            Some(Utc::now()),
        );
    }

    /// Subscribe the registry to a gateway client's lifecycle events.
    pub fn attach(&self, client: &GatewayClient) -> Subscription {
        let registry = self.clone();
        client.on_event(move |event| {
            if event.event == crate::event::RUN_EVENT
                && let Some(phase_event) = RunPhaseEvent::from_payload(&event.payload)
            {
                registry.handle_run_event(&phase_event);
            }
            Ok(())
        })
    }

    /// Whether the registry still holds an entry for `run_id`.
    pub fn is_tracked(&self, run_id: &RunId) -> bool {
        self.inner.runs.contains_key(run_id)
    }

    /// Number of entries currently held (completed `Keep` entries included).
    pub fn tracked_runs(&self) -> usize {
        self.inner.runs.len()
    }

    fn lookup(&self, run_id: &RunId) -> Option<Arc<RegisteredRun>> {
        self.inner.runs.get(run_id).map(|entry| Arc::clone(&entry))
    }

    fn emit(
        &self,
        run: &RegisteredRun,
        action: HookAction,
        outcome: RunOutcome,
        reason: Option<String>,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
    ) {
        let runtime_ms = started_at
            .zip(ended_at)
            .map(|(started, ended)| (ended - started).num_milliseconds().max(0));
        let event = HookEvent {
            action,
            session_key: run.requester_session_key.clone(),
            run_id: run.run_id.clone(),
            child_session_key: run.child_session_key.clone(),
            task: run.task.clone(),
            outcome,
            reason,
            started_at,
            ended_at,
            runtime_ms,
        };
        info!(
            run_id = %run.run_id,
            action = action.as_str(),
            runtime = %runtime_ms.map(format_runtime_short).unwrap_or_else(|| "n/a".to_string()),
            "run completed"
        );
        self.inner.hook.on_run_complete(&event);

        if run.cleanup == CleanupPolicy::Delete {
            self.inner.runs.remove(&run.run_id);
        }
    }
}
