use thiserror::Error;

/// Errors a tool may raise from `execute`.
#[derive(Debug, Error)]
pub enum ToolError {
  /// Missing required input field.
  #[error("missing required input: {field}")]
  MissingInput { field: String },

  /// Invalid input value.
  #[error("invalid input '{field}': {message}")]
  InvalidInput { field: String, message: String },

  /// The tool body failed. The message is surfaced verbatim in the
  /// execution record.
  #[error("{0}")]
  Execution(String),

  /// Execution was cancelled through the cancellation handle.
  #[error("tool execution cancelled")]
  Cancelled,
}

impl ToolError {
  pub fn execution(message: impl Into<String>) -> Self {
    Self::Execution(message.into())
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled)
  }
}
