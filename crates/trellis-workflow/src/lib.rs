//! Trellis Workflow
//!
//! This crate provides the workflow specification types and the DAG
//! validator. A [`WorkflowSpec`] names registered tools and wires upstream
//! outputs into downstream inputs; [`ExecutionPlan::build`] validates the
//! graph and produces layered batches ready for concurrent dispatch.
//!
//! Ordering edges come from two sources that are unioned:
//! - explicit `edges` entries, and
//! - implicit edges derived from `input_mappings` (a node that reads
//!   `"upstream.field"` depends on `upstream`).

mod error;
mod graph;
mod plan;
mod spec;

pub use error::GraphError;
pub use graph::Graph;
pub use plan::ExecutionPlan;
pub use spec::{Edge, NodeSpec, WorkflowSpec};
