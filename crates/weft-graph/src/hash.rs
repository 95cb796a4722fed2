//! Content hashing for node replay decisions.
//!
//! The hash covers everything that can change a node's effective inputs:
//! the run coordinates, the plan version, the graph-level inputs, and the
//! outputs of the node's dependencies. Because dependency outputs feed the
//! hash, an upstream output change automatically invalidates every
//! downstream dependent without a separate dirty-propagation pass.

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use weft_core::{GraphId, NodeId, RunId};

/// Compute the replay hash for one node attempt.
///
/// serde_json objects serialize with sorted keys, so the digest is
/// independent of the order dependency outputs or input fields were
/// assembled in.
pub fn inputs_hash(
    graph_id: &GraphId,
    run_id: &RunId,
    node_id: &NodeId,
    plan_version: &str,
    graph_inputs: &Value,
    dep_outputs: &BTreeMap<NodeId, Value>,
) -> String {
    let deps: BTreeMap<&str, &Value> = dep_outputs
        .iter()
        .map(|(id, output)| (id.as_str(), output))
        .collect();
    let material = json!({
        "graphId": graph_id.as_str(),
        "runId": run_id.as_str(),
        "nodeId": node_id.as_str(),
        "planVersion": plan_version,
        "graphInputs": graph_inputs,
        "depOutputs": deps,
    });
    let serialized = material.to_string();
    let digest = Sha256::digest(serialized.as_bytes());
    hex::encode(digest)
}
