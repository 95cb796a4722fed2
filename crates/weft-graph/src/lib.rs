//! # Weft Graph
//!
//! Resumable DAG executor for the Weft runtime core.
//!
//! A graph is declared as named nodes with dependency edges, validated and
//! ordered at build time, and executed strictly sequentially. Per-node state
//! is persisted through a pluggable [`RunStore`] at every transition, which
//! makes a run crash-safe: re-executing the same `(graph_id, run_id)` skips
//! nodes whose persisted success still matches the current plan version and
//! inputs hash, and re-attempts everything else.
//!
//! The executor does not depend on the transport; node handlers may reach a
//! remote agent through whatever client the application hands them.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use weft_core::{GraphId, RunId};
//! use weft_graph::{
//!     FnHandler, GraphDefinition, GraphExecutor, InMemoryRunStore, NodeInvocation, RunStatus,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fetch = Arc::new(FnHandler(|_inv: NodeInvocation<'_>| Ok(json!({"rows": 3}))));
//! let report_rows = Arc::new(FnHandler(|inv: NodeInvocation<'_>| {
//!     let rows = inv
//!         .dep_outputs
//!         .values()
//!         .next()
//!         .and_then(|output| output["rows"].as_i64())
//!         .unwrap_or(0);
//!     Ok(json!(format!("{rows} rows processed")))
//! }));
//! let graph = GraphDefinition::new(GraphId::parse("etl")?, "v1")
//!     .node("fetch", Vec::<String>::new(), fetch)
//!     .node("report", ["fetch"], report_rows)
//!     .build()?;
//!
//! let executor = GraphExecutor::new(Arc::new(InMemoryRunStore::new()));
//! let report = executor.execute(&graph, &RunId::parse("run-1")?, &json!({})).await?;
//! assert_eq!(report.status, RunStatus::Succeeded);
//! # Ok(())
//! # }
//! ```

mod definition;
mod error;
mod executor;
mod hash;
mod node;
mod state;
mod store;

pub use definition::{ExecutionGraph, GraphDefinition};
pub use error::{GraphBuildError, GraphError};
pub use executor::{ExecutorConfig, GraphExecutor, RunReport, RunStatus};
pub use hash::inputs_hash;
pub use node::{FnHandler, NodeFailure, NodeHandler, NodeInvocation};
pub use state::{GraphRunRecord, NodeStateRecord, NodeStatus, SCHEMA_VERSION};
pub use store::{InMemoryRunStore, JsonFileRunStore, RunStore, StoreError};
