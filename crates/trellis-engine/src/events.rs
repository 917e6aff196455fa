//! Lifecycle events streamed during workflow execution.
//!
//! The stream is lazy, finite, and non-restartable: the engine is the
//! producer, a transport adapter the consumer. Ordering guarantees:
//! `Start` strictly precedes any node event, node events strictly precede
//! the workflow terminal event, and `Complete` is always last. Events for
//! distinct nodes are unordered; observers must not infer topology from
//! event order.

use serde::{Deserialize, Serialize};

/// One observable transition in a workflow's life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
  /// Exactly once, first event of an accepted workflow.
  Start {
    workflow_id: String,
    total_nodes: usize,
  },

  /// A node was dispatched to a runner.
  NodeStarted { node_id: String },

  /// A node succeeded. `progress` is completed/total, monotonically
  /// non-decreasing across the stream.
  NodeCompleted {
    node_id: String,
    progress: f64,
    outputs: serde_json::Map<String, serde_json::Value>,
  },

  /// The first fatal node failure. At most once per workflow.
  NodeFailed { node_id: String, error: String },

  /// Every node succeeded.
  WorkflowCompleted {
    workflow_id: String,
    results: serde_json::Map<String, serde_json::Value>,
  },

  /// The workflow failed, at validation or at the first fatal node.
  WorkflowFailed { workflow_id: String, error: String },

  /// Stream terminator, always last.
  Complete,
}
