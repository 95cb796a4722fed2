//! # Weft
//!
//! Reliability core for multi-agent runtimes: a coordinator hands work to
//! independently running agent processes, gets results back over an
//! unreliable transport, and resumes long multi-step computations after a
//! crash without redoing completed work or double-reporting outcomes.
//!
//! The workspace splits into three tightly coupled subsystems:
//!
//! - [`weft_gateway`] — a WebSocket RPC transport that survives disconnects
//!   while keeping in-flight calls correctly matched to their responses
//! - [`weft_lifecycle`] — a run registry that collapses racing completion
//!   signals into exactly one reported outcome per run
//! - [`weft_graph`] — a resumable DAG executor that persists per-step state
//!   and safely skips already-completed steps on resume
//!
//! This crate re-exports the pieces most applications need.

pub use weft_core::{
    GraphId, IdValidationError, NodeId, ReconnectPolicy, RunId, SessionKey, WireMessage,
};
pub use weft_gateway::{
    ConnectionStatus, GatewayClient, GatewayConfig, GatewayError, GatewayEvent, GatewayResult,
    StatusChange, Subscription,
};
pub use weft_graph::{
    ExecutionGraph, FnHandler, GraphBuildError, GraphDefinition, GraphError, GraphExecutor,
    GraphRunRecord, InMemoryRunStore, JsonFileRunStore, NodeFailure, NodeHandler, NodeInvocation,
    NodeStatus, RunReport, RunStatus, RunStore,
};
pub use weft_lifecycle::{
    AgentWait, CleanupPolicy, CompletionHook, HookAction, HookEvent, RunDescriptor, RunOutcome,
    RunPhaseEvent, RunRegistry, WaitOutcome, WaitStatus,
};
