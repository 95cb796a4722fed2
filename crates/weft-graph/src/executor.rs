//! Sequential, crash-safe graph execution.
//!
//! Nodes run strictly in topological order. Every status transition is
//! persisted through the [`RunStore`] before the engine proceeds: a node's
//! `running` state is durable before its handler is invoked, and its output
//! is durable before any dependent can observe it. Re-executing the same
//! `(graph_id, run_id)` skips nodes whose persisted success still matches
//! the current plan version and inputs hash.

use crate::definition::ExecutionGraph;
use crate::error::GraphError;
use crate::hash::inputs_hash;
use crate::node::{NodeInvocation, summarize_value};
use crate::state::{GraphRunRecord, NodeStateRecord, NodeStatus};
use crate::store::RunStore;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use weft_core::{NodeId, RunId};

const DEFAULT_SUMMARY_LIMIT: usize = 240;
const DEFAULT_TRACE_LIMIT: usize = 4_000;

/// Bounds applied when persisting previews and failure traces.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub summary_limit: usize,
    pub trace_limit: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            summary_limit: DEFAULT_SUMMARY_LIMIT,
            trace_limit: DEFAULT_TRACE_LIMIT,
        }
    }
}

/// Overall result of one run attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// What one call to [`GraphExecutor::execute`] produced.
#[derive(Debug)]
pub struct RunReport {
    pub status: RunStatus,
    /// The node whose failure halted the run, for failed runs
    pub failed_node: Option<NodeId>,
    /// Rendered failure trace, for failed runs
    pub error: Option<String>,
    /// Outputs of every node that succeeded (or replayed) this attempt
    pub node_outputs: BTreeMap<NodeId, Value>,
    /// Nodes whose persisted output was reused without running user code
    pub replayed: Vec<NodeId>,
    /// Nodes whose handler actually ran this attempt
    pub executed: Vec<NodeId>,
}

/// Drives [`ExecutionGraph`]s against a [`RunStore`].
///
/// Independent runs (different run ids) are fully independent; within one
/// run, nodes execute sequentially.
pub struct GraphExecutor {
    store: Arc<dyn RunStore>,
    config: ExecutorConfig,
}

impl GraphExecutor {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self {
            store,
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(store: Arc<dyn RunStore>, config: ExecutorConfig) -> Self {
        Self { store, config }
    }

    /// Execute (or resume) `graph` under `run_id`.
    ///
    /// Returns `Err` only for engine-level problems (store failures); node
    /// handler failures are reported through the [`RunReport`].
    pub async fn execute(
        &self,
        graph: &ExecutionGraph,
        run_id: &RunId,
        graph_inputs: &Value,
    ) -> Result<RunReport, GraphError> {
        let mut record = match self.store.load(graph.id(), run_id)? {
            Some(mut existing) => {
                debug!(graph_id = %graph.id(), run_id = %run_id, "resuming persisted run");
                existing.plan_version = graph.plan_version().to_string();
                existing
            }
            None => GraphRunRecord::new(graph.id().clone(), run_id.clone(), graph.plan_version()),
        };

        let mut outputs: BTreeMap<NodeId, Value> = BTreeMap::new();
        let mut replayed = Vec::new();
        let mut executed = Vec::new();

        for &index in &graph.order {
            let node = &graph.nodes[index];

            let dep_outputs: BTreeMap<NodeId, Value> = node
                .deps
                .iter()
                .map(|dep| (dep.clone(), outputs.get(dep).cloned().unwrap_or(Value::Null)))
                .collect();
            let hash = inputs_hash(
                graph.id(),
                run_id,
                &node.id,
                graph.plan_version(),
                graph_inputs,
                &dep_outputs,
            );

            // Replay rule: a persisted success with the same plan version and
            // the same inputs hash is reused without running user code.
            if let Some(prior) = record.node(&node.id)
                && prior.status == NodeStatus::Succeeded
                && prior.plan_version == graph.plan_version()
                && prior.inputs_hash == hash
            {
                debug!(node_id = %node.id, "replaying persisted output");
                outputs.insert(node.id.clone(), prior.output.clone().unwrap_or(Value::Null));
                replayed.push(node.id.clone());
                continue;
            }

            // Durable evidence that the node started must exist before any
            // user code runs.
            let attempt = record
                .node(&node.id)
                .map(|prior| prior.attempts)
                .unwrap_or(0)
                .saturating_add(1);
            let now = Utc::now();
            record.nodes.insert(
                node.id.clone(),
                NodeStateRecord {
                    node_id: node.id.clone(),
                    status: NodeStatus::Running,
                    plan_version: graph.plan_version().to_string(),
                    inputs_hash: hash.clone(),
                    output: None,
                    outputs_summary: None,
                    error_trace: None,
                    started_at: now,
                    updated_at: now,
                    attempts: attempt,
                },
            );
            record.touch();
            self.store.save(&record)?;

            debug!(node_id = %node.id, attempt, "running node");
            let invocation = NodeInvocation {
                graph_id: graph.id(),
                run_id,
                node_id: &node.id,
                plan_version: graph.plan_version(),
                attempt,
                graph_inputs,
                dep_outputs: &dep_outputs,
            };

            match node.handler.run(invocation).await {
                Ok(output) => {
                    let summary = node
                        .handler
                        .summarize(&output)
                        .map(|custom| bound_summary(&custom, self.config.summary_limit))
                        .unwrap_or_else(|| summarize_value(&output, self.config.summary_limit));
                    if let Some(state) = record.nodes.get_mut(&node.id) {
                        state.status = NodeStatus::Succeeded;
                        state.output = Some(output.clone());
                        state.outputs_summary = Some(summary);
                        state.updated_at = Utc::now();
                    }
                    record.touch();
                    self.store.save(&record)?;
                    outputs.insert(node.id.clone(), output);
                    executed.push(node.id.clone());
                }
                Err(failure) => {
                    let trace = failure.render(self.config.trace_limit);
                    if let Some(state) = record.nodes.get_mut(&node.id) {
                        state.status = NodeStatus::Failed;
                        state.error_trace = Some(trace.clone());
                        state.updated_at = Utc::now();
                    }
                    record.touch();
                    self.store.save(&record)?;
                    warn!(node_id = %node.id, attempt, "node failed, halting run");
                    return Ok(RunReport {
                        status: RunStatus::Failed,
                        failed_node: Some(node.id.clone()),
                        error: Some(trace),
                        node_outputs: outputs,
                        replayed,
                        executed,
                    });
                }
            }
        }

        Ok(RunReport {
            status: RunStatus::Succeeded,
            failed_node: None,
            error: None,
            node_outputs: outputs,
            replayed,
            executed,
        })
    }
}

fn bound_summary(summary: &str, limit: usize) -> String {
    if summary.chars().count() <= limit {
        return summary.to_string();
    }
    let truncated: String = summary.chars().take(limit.saturating_sub(1)).collect();
    format!("{truncated}…")
}
