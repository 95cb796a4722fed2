//! Graph declaration and build-time validation.
//!
//! A [`GraphDefinition`] collects nodes with their dependency lists; `build`
//! validates the declaration and fixes a deterministic execution order.
//! Build errors are fatal: no node of a malformed graph ever runs.

use crate::error::GraphBuildError;
use crate::node::NodeHandler;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use weft_core::{GraphId, NodeId};

struct NodeDecl {
    id: String,
    deps: Vec<String>,
    handler: Arc<dyn NodeHandler>,
}

/// Declarative description of an execution graph.
pub struct GraphDefinition {
    id: GraphId,
    /// Callers must bump this whenever a node's behavior changes; replay
    /// decisions compare it against persisted node state, and stale outputs
    /// will be reused if a behavior change ships without a bump.
    plan_version: String,
    nodes: Vec<NodeDecl>,
}

impl GraphDefinition {
    pub fn new(id: GraphId, plan_version: impl Into<String>) -> Self {
        Self {
            id,
            plan_version: plan_version.into(),
            nodes: Vec::new(),
        }
    }

    /// Declare a node. Declaration order matters: it breaks ties in the
    /// execution order.
    pub fn node<I, D>(mut self, id: I, deps: D, handler: Arc<dyn NodeHandler>) -> Self
    where
        I: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        self.nodes.push(NodeDecl {
            id: id.into(),
            deps: deps.into_iter().map(Into::into).collect(),
            handler,
        });
        self
    }

    /// Validate the declaration and compute the execution order.
    pub fn build(self) -> Result<ExecutionGraph, GraphBuildError> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        let mut index_of: HashMap<NodeId, usize> = HashMap::new();

        for (index, decl) in self.nodes.iter().enumerate() {
            let id = NodeId::parse(&decl.id).map_err(|source| GraphBuildError::InvalidId {
                id: decl.id.clone(),
                source,
            })?;
            if index_of.insert(id.clone(), index).is_some() {
                return Err(GraphBuildError::DuplicateNode(id));
            }
            nodes.push(id);
        }

        let mut deps: Vec<Vec<NodeId>> = Vec::with_capacity(self.nodes.len());
        for (index, decl) in self.nodes.iter().enumerate() {
            let mut node_deps = Vec::with_capacity(decl.deps.len());
            for dep in &decl.deps {
                let dep = NodeId::parse(dep).map_err(|source| GraphBuildError::InvalidId {
                    id: dep.clone(),
                    source,
                })?;
                if !index_of.contains_key(&dep) {
                    return Err(GraphBuildError::UnknownDependency {
                        node: nodes[index].clone(),
                        dependency: dep,
                    });
                }
                if dep == nodes[index] {
                    return Err(GraphBuildError::SelfDependency(dep));
                }
                node_deps.push(dep);
            }
            deps.push(node_deps);
        }

        let order = topological_order(&nodes, &deps, &index_of)?;

        let built = self
            .nodes
            .into_iter()
            .zip(nodes)
            .zip(deps)
            .map(|((decl, id), deps)| BuiltNode {
                id,
                deps,
                handler: decl.handler,
            })
            .collect();

        Ok(ExecutionGraph {
            id: self.id,
            plan_version: self.plan_version,
            nodes: built,
            order,
        })
    }
}

/// Kahn's algorithm with ties broken by declaration index, so two graphs
/// built from the same node list always execute in the same order.
fn topological_order(
    nodes: &[NodeId],
    deps: &[Vec<NodeId>],
    index_of: &HashMap<NodeId, usize>,
) -> Result<Vec<usize>, GraphBuildError> {
    let mut indegree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

    for (index, node_deps) in deps.iter().enumerate() {
        indegree[index] = node_deps.len();
        for dep in node_deps {
            dependents[index_of[dep]].push(index);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| Reverse(index))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        for &dependent in &dependents[index] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() != nodes.len() {
        let ordered: std::collections::HashSet<usize> = order.into_iter().collect();
        let remaining = nodes
            .iter()
            .enumerate()
            .filter(|(index, _)| !ordered.contains(index))
            .map(|(_, id)| id.clone())
            .collect();
        return Err(GraphBuildError::Cycle { remaining });
    }
    Ok(order)
}

pub(crate) struct BuiltNode {
    pub(crate) id: NodeId,
    pub(crate) deps: Vec<NodeId>,
    pub(crate) handler: Arc<dyn NodeHandler>,
}

/// A validated graph with a fixed execution order.
pub struct ExecutionGraph {
    pub(crate) id: GraphId,
    pub(crate) plan_version: String,
    pub(crate) nodes: Vec<BuiltNode>,
    pub(crate) order: Vec<usize>,
}

impl ExecutionGraph {
    pub fn id(&self) -> &GraphId {
        &self.id
    }

    pub fn plan_version(&self) -> &str {
        &self.plan_version
    }

    /// Node ids in the order they will execute.
    pub fn execution_order(&self) -> Vec<&NodeId> {
        self.order.iter().map(|&index| &self.nodes[index].id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FnHandler, NodeInvocation};
    use serde_json::json;

    fn noop() -> Arc<dyn NodeHandler> {
        Arc::new(FnHandler(|_: NodeInvocation<'_>| Ok(json!(null))))
    }

    fn graph() -> GraphDefinition {
        GraphDefinition::new(GraphId::new_unchecked("g1"), "v1")
    }

    #[test]
    fn diamond_resolves_in_declaration_order() {
        let built = graph()
            .node("A", Vec::<String>::new(), noop())
            .node("B", ["A"], noop())
            .node("C", ["A"], noop())
            .node("D", ["B", "C"], noop())
            .build()
            .unwrap();
        let order: Vec<&str> = built.execution_order().iter().map(|id| id.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn declaration_index_breaks_ties_not_readiness_time() {
        // Both X and Y become ready after A completes; X was declared first
        // even though Y's edge is processed first.
        let built = graph()
            .node("Y", ["A"], noop())
            .node("X", ["A"], noop())
            .node("A", Vec::<String>::new(), noop())
            .build()
            .unwrap();
        let order: Vec<&str> = built.execution_order().iter().map(|id| id.as_str()).collect();
        assert_eq!(order, vec!["A", "Y", "X"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let result = graph()
            .node("A", ["B"], noop())
            .node("B", ["A"], noop())
            .build();
        match result {
            Err(GraphBuildError::Cycle { remaining }) => {
                assert_eq!(remaining.len(), 2);
            }
            other => panic!("expected cycle error, got {:?}", other.err()),
        }
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let result = graph()
            .node("A", Vec::<String>::new(), noop())
            .node("A", Vec::<String>::new(), noop())
            .build();
        assert!(matches!(result, Err(GraphBuildError::DuplicateNode(id)) if id.as_str() == "A"));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let result = graph().node("A", ["missing"], noop()).build();
        assert!(matches!(
            result,
            Err(GraphBuildError::UnknownDependency { node, dependency })
                if node.as_str() == "A" && dependency.as_str() == "missing"
        ));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let result = graph().node("A", ["A"], noop()).build();
        assert!(matches!(result, Err(GraphBuildError::SelfDependency(id)) if id.as_str() == "A"));
    }

    #[test]
    fn invalid_id_is_rejected() {
        let result = graph().node("not valid", Vec::<String>::new(), noop()).build();
        assert!(matches!(result, Err(GraphBuildError::InvalidId { .. })));
    }

    #[test]
    fn same_declaration_always_builds_same_order() {
        let order_of = |_: ()| {
            let built = graph()
                .node("fetch", Vec::<String>::new(), noop())
                .node("parse", ["fetch"], noop())
                .node("enrich", ["fetch"], noop())
                .node("merge", ["parse", "enrich"], noop())
                .build()
                .unwrap();
            built
                .execution_order()
                .iter()
                .map(|id| id.as_str().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(order_of(()), order_of(()));
    }
}
