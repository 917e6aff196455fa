use thiserror::Error;

/// Validation errors for a workflow graph.
///
/// All of these are fatal before execution starts; a workflow that fails
/// validation is never persisted as running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  /// An edge or input mapping references a node that is not declared.
  #[error("unknown node: {0}")]
  UnknownNode(String),

  #[error("workflow graph contains a cycle")]
  Cycle,

  /// A node names a tool absent from the registry. Raised by the engine's
  /// pre-validation; part of the same taxonomy so callers see one error
  /// space for rejected workflows.
  #[error("unknown tool: {0}")]
  UnknownTool(String),
}

impl GraphError {
  /// Short machine-readable kind for event payloads.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::DuplicateNode(_) => "duplicate",
      Self::UnknownNode(_) => "unknown-node",
      Self::Cycle => "cycle",
      Self::UnknownTool(_) => "unknown-tool",
    }
  }
}
