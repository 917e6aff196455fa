use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::contract::ToolContract;
use crate::error::ToolError;

/// Dynamic input mapping passed to a tool.
pub type ToolInputs = serde_json::Map<String, serde_json::Value>;

/// Dynamic output mapping returned by a tool. Must conform to the
/// contract's `output_schema`; the engine validates before persisting.
pub type ToolOutputs = serde_json::Map<String, serde_json::Value>;

/// A tool plug-in.
///
/// Implementations are opaque to the engine. `execute` may suspend on I/O
/// and must honour `cancel` by promptly ceasing work; the engine races the
/// invocation against the token either way.
#[async_trait]
pub trait Tool: Send + Sync {
  /// The tool's static contract. Queried once at registration.
  fn contract(&self) -> ToolContract;

  /// Execute with fully-resolved inputs.
  async fn execute(
    &self,
    inputs: ToolInputs,
    cancel: CancellationToken,
  ) -> Result<ToolOutputs, ToolError>;
}
