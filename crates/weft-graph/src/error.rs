//! Error types for graph building and execution

use thiserror::Error;
use weft_core::{IdValidationError, NodeId};

/// Errors raised while validating a graph definition. All of these are fatal
/// to the run attempt: no node executes on a malformed graph.
#[derive(Error, Debug)]
pub enum GraphBuildError {
    /// A node id was declared twice
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// A node depends on an id that was never declared
    #[error("node {node} depends on unknown node {dependency}")]
    UnknownDependency { node: NodeId, dependency: NodeId },

    /// A node lists itself as a dependency
    #[error("node {0} depends on itself")]
    SelfDependency(NodeId),

    /// The dependency edges contain a cycle
    #[error("dependency cycle involving nodes: {}", .remaining.iter().map(|n| n.as_str()).collect::<Vec<_>>().join(", "))]
    Cycle { remaining: Vec<NodeId> },

    /// A declared id or dependency is not a valid identifier
    #[error("invalid node id '{id}': {source}")]
    InvalidId {
        id: String,
        source: IdValidationError,
    },
}

/// Errors surfaced by the executor itself.
///
/// Node handler failures are not represented here: they become persisted
/// `failed` node state and a failed run report, never an executor error.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Build(#[from] GraphBuildError),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}
