use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An explicit ordering edge: `from` must complete before `to` starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
  pub from: String,
  pub to: String,
}

/// One tool invocation within a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
  /// Unique within the workflow.
  pub node_id: String,
  /// Name of a registered tool.
  pub tool: String,
  /// Inputs supplied verbatim by the caller.
  #[serde(default)]
  pub literal_inputs: serde_json::Map<String, serde_json::Value>,
  /// `"<upstream_node_id>.<output_field>"` -> local input field. Each
  /// mapping also implies an ordering edge from the upstream node.
  #[serde(default)]
  pub input_mappings: HashMap<String, String>,
}

/// A workflow request payload: a set of nodes plus ordering edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
  pub nodes: Vec<NodeSpec>,
  #[serde(default)]
  pub edges: Vec<Edge>,
}

impl WorkflowSpec {
  pub fn node(&self, node_id: &str) -> Option<&NodeSpec> {
    self.nodes.iter().find(|n| n.node_id == node_id)
  }

  /// Split a mapping key into `(upstream_node_id, output_field)`.
  ///
  /// Returns `None` when the key carries no `.` separator; the validator
  /// treats such a key as a reference to an unknown node.
  pub fn split_mapping_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('.')
  }
}
