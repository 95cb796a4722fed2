//! Persisted run and node state.
//!
//! One [`GraphRunRecord`] exists per `(graph_id, run_id)` pair. It is created
//! on the first execution attempt, loaded and mutated on every resume, and
//! never deleted by the engine itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use weft_core::{GraphId, NodeId, RunId};

/// Version of the persisted record layout.
pub const SCHEMA_VERSION: u32 = 1;

/// Lifecycle of one node within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Persisted before the handler is invoked; a leftover `running` state
    /// after a crash marks the node as incomplete and not replay-eligible
    Running,
    Succeeded,
    Failed,
}

/// Persisted state of one node, overwritten on every status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStateRecord {
    pub node_id: NodeId,
    pub status: NodeStatus,
    /// Plan version at the time this state was written
    pub plan_version: String,
    /// Content hash of the node's effective inputs
    pub inputs_hash: String,
    /// Output value, present once the node has succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Bounded human-readable output preview
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_summary: Option<String>,
    /// Bounded failure trace, present only for failed nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_trace: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Times this node has been started (across resumes)
    pub attempts: u32,
}

/// Persisted state of one run of one graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRunRecord {
    pub schema_version: u32,
    pub graph_id: GraphId,
    pub run_id: RunId,
    pub plan_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Per-node state keyed by node id
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, NodeStateRecord>,
}

impl GraphRunRecord {
    /// Fresh record for a first execution attempt.
    pub fn new(graph_id: GraphId, run_id: RunId, plan_version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION,
            graph_id,
            run_id,
            plan_version: plan_version.into(),
            created_at: now,
            updated_at: now,
            nodes: BTreeMap::new(),
        }
    }

    /// Stamp the record as modified.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// State for one node, if any attempt has been recorded.
    pub fn node(&self, node_id: &NodeId) -> Option<&NodeStateRecord> {
        self.nodes.get(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_round_trips_through_json() {
        let mut record = GraphRunRecord::new(
            GraphId::new_unchecked("g1"),
            RunId::new_unchecked("r1"),
            "v1",
        );
        let node_id = NodeId::new_unchecked("a");
        record.nodes.insert(
            node_id.clone(),
            NodeStateRecord {
                node_id: node_id.clone(),
                status: NodeStatus::Succeeded,
                plan_version: "v1".to_string(),
                inputs_hash: "abc".to_string(),
                output: Some(json!({"value": 1})),
                outputs_summary: Some("object{value}".to_string()),
                error_trace: None,
                started_at: Utc::now(),
                updated_at: Utc::now(),
                attempts: 1,
            },
        );

        let raw = serde_json::to_string(&record).unwrap();
        let parsed: GraphRunRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.schema_version, SCHEMA_VERSION);
        assert_eq!(parsed.node(&node_id).unwrap().status, NodeStatus::Succeeded);
        assert_eq!(parsed.node(&node_id).unwrap().output, Some(json!({"value": 1})));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&NodeStatus::Running).unwrap(), "\"running\"");
        assert_eq!(serde_json::to_string(&NodeStatus::Failed).unwrap(), "\"failed\"");
    }
}
