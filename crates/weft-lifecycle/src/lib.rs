//! # Weft Lifecycle
//!
//! Run-lifecycle registry for the Weft runtime core.
//!
//! The registry tracks spawned agent runs and collapses their racing
//! completion signals — the gateway's lifecycle event stream, the
//! `agent.wait` poll, and administrative termination — into exactly one
//! [`HookEvent`] per run. The guarantee is structural: a per-run atomic
//! compare-and-swap decides the winner, so no interleaving can double-report
//! or drop a completion.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weft_core::{RunId, SessionKey};
//! use weft_gateway::{GatewayClient, GatewayConfig};
//! use weft_lifecycle::{CleanupPolicy, CompletionHook, HookEvent, RunDescriptor, RunRegistry};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GatewayClient::new(GatewayConfig::new("ws://127.0.0.1:4500"));
//! client.connect().await?;
//!
//! let registry = RunRegistry::new(
//!     Arc::new(client.clone()),
//!     Arc::new(|event: &HookEvent| {
//!         println!("run {} finished: {}", event.run_id, event.action.as_str());
//!     }),
//! );
//! registry.attach(&client);
//!
//! registry.register_run(RunDescriptor {
//!     run_id: RunId::parse("run-1")?,
//!     child_session_key: SessionKey::parse("agent.child")?,
//!     requester_session_key: SessionKey::parse("main")?,
//!     task: "summarize the report".to_string(),
//!     cleanup: CleanupPolicy::Delete,
//!     expects_completion_message: true,
//! });
//! # Ok(())
//! # }
//! ```

mod event;
mod hook;
mod registry;
mod wait;

pub use event::{PHASE_END, RUN_EVENT, RunPhaseEvent};
pub use hook::{CompletionHook, HookAction, HookEvent, OutcomeStatus, RunOutcome};
pub use registry::{CleanupPolicy, RegistryConfig, RunDescriptor, RunRegistry};
pub use wait::{AgentWait, WaitOutcome, WaitStatus};
