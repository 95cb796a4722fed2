//! Node handler contract.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use weft_core::{GraphId, NodeId, RunId};

/// Everything a node's function receives for one attempt.
#[derive(Debug)]
pub struct NodeInvocation<'a> {
    pub graph_id: &'a GraphId,
    pub run_id: &'a RunId,
    pub node_id: &'a NodeId,
    pub plan_version: &'a str,
    /// 1-based attempt counter, monotonic across resumes. Handlers with
    /// external side effects can use it to de-duplicate work.
    pub attempt: u32,
    /// Graph-level inputs shared by every node in the run
    pub graph_inputs: &'a Value,
    /// Outputs of this node's declared dependencies, keyed by node id
    pub dep_outputs: &'a BTreeMap<NodeId, Value>,
}

/// A node failure as persisted into the run record.
#[derive(Debug, Clone)]
pub struct NodeFailure {
    pub name: String,
    pub message: String,
    pub trace: Option<String>,
}

impl NodeFailure {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            trace: None,
        }
    }

    /// Shorthand for an unnamed error.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Render `name: message` plus the trace, truncated to `limit` chars.
    pub(crate) fn render(&self, limit: usize) -> String {
        let mut rendered = format!("{}: {}", self.name, self.message);
        if let Some(trace) = &self.trace {
            rendered.push('\n');
            rendered.push_str(trace);
        }
        truncate_chars(&rendered, limit)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for NodeFailure {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::msg(err.to_string())
    }
}

impl From<String> for NodeFailure {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for NodeFailure {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

/// The application-supplied function behind one graph node.
///
/// Handlers may raise, and may themselves perform RPC through the gateway.
/// The engine imposes no per-node timeout; bounding a node's runtime is the
/// handler's own responsibility. A handler that is not naturally idempotent
/// must be safe to re-run after a crash (see [`NodeInvocation::attempt`]).
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn run(&self, invocation: NodeInvocation<'_>) -> Result<Value, NodeFailure>;

    /// Optional custom output summary. `None` falls back to the generic
    /// type-tagged preview.
    fn summarize(&self, _output: &Value) -> Option<String> {
        None
    }
}

/// Adapter turning a plain synchronous closure into a [`NodeHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> NodeHandler for FnHandler<F>
where
    F: for<'a> Fn(NodeInvocation<'a>) -> Result<Value, NodeFailure> + Send + Sync,
{
    async fn run(&self, invocation: NodeInvocation<'_>) -> Result<Value, NodeFailure> {
        (self.0)(invocation)
    }
}

/// Generic type-tagged preview of a node output, truncated to `limit` chars.
pub(crate) fn summarize_value(output: &Value, limit: usize) -> String {
    let preview = match output {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool: {b}"),
        Value::Number(n) => format!("number: {n}"),
        Value::String(s) => format!("string: {s}"),
        Value::Array(items) => format!("array[{}]: {}", items.len(), Value::Array(items.clone())),
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object{{{}}}: {}", keys.join(","), output)
        }
    };
    truncate_chars(&preview, limit)
}

fn truncate_chars(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let truncated: String = s.chars().take(limit.saturating_sub(1)).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summaries_are_type_tagged() {
        assert_eq!(summarize_value(&Value::Null, 240), "null");
        assert_eq!(summarize_value(&json!(true), 240), "bool: true");
        assert_eq!(summarize_value(&json!(42), 240), "number: 42");
        assert_eq!(summarize_value(&json!("hi"), 240), "string: hi");
        assert!(summarize_value(&json!([1, 2, 3]), 240).starts_with("array[3]:"));
        assert!(summarize_value(&json!({"a": 1}), 240).starts_with("object{a}:"));
    }

    #[test]
    fn long_summaries_are_truncated() {
        let long = json!("x".repeat(1_000));
        let summary = summarize_value(&long, 240);
        assert!(summary.chars().count() <= 240);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn failure_render_caps_trace() {
        let failure = NodeFailure::new("TypeError", "bad input").with_trace("y".repeat(10_000));
        let rendered = failure.render(4_000);
        assert!(rendered.starts_with("TypeError: bad input\n"));
        assert!(rendered.chars().count() <= 4_000);
    }
}
