use thiserror::Error;
use trellis_store::StoreError;
use trellis_workflow::GraphError;

/// Errors that can occur during workflow execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
  /// The workflow graph failed validation. Fatal before `start`; the
  /// workflow is never persisted as running.
  #[error(transparent)]
  Graph(#[from] GraphError),

  /// An input mapping referenced an upstream output that does not exist.
  #[error("unresolved input for node '{node_id}': {reference}")]
  UnresolvedInput { node_id: String, reference: String },

  /// Resolved inputs violate the tool's declared input schema.
  #[error("input schema violation for node '{node_id}': {detail}")]
  InputSchema { node_id: String, detail: String },

  /// The tool returned a shape that violates its declared output schema.
  #[error("output schema violation for node '{node_id}': {detail}")]
  OutputSchema { node_id: String, detail: String },

  /// The tool body failed; the message is captured verbatim.
  #[error("{message}")]
  Tool { node_id: String, message: String },

  /// Execution was cancelled, externally or by the workflow deadline.
  #[error("cancelled")]
  Cancelled,

  /// The store was lost mid-execution.
  #[error("persistence failure: {0}")]
  Persistence(#[from] StoreError),
}

impl ExecutionError {
  /// Short machine-readable kind, paired with the display message in
  /// events and the error log.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Graph(e) => e.kind(),
      Self::UnresolvedInput { .. } => "unresolved-input",
      Self::InputSchema { .. } => "input-schema",
      Self::OutputSchema { .. } => "output-schema",
      Self::Tool { .. } => "execution",
      Self::Cancelled => "cancelled",
      Self::Persistence(_) => "persistence",
    }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled)
  }
}
