//! Test-only tool stubs.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use trellis_tool::{Tool, ToolCategory, ToolContract, ToolError, ToolInputs, ToolOutputs};

/// A tool defined entirely by a fixed contract; execution echoes inputs.
pub struct StaticTool {
  contract: ToolContract,
}

impl StaticTool {
  pub fn new(contract: ToolContract) -> Self {
    Self { contract }
  }

  pub fn utility(name: &str) -> Self {
    Self::new(ToolContract::new(name, "test utility", ToolCategory::Utility))
  }

  pub fn heavy(name: &str) -> Self {
    Self::new(ToolContract::new(name, "test heavy tool", ToolCategory::Heavy))
  }
}

#[async_trait]
impl Tool for StaticTool {
  fn contract(&self) -> ToolContract {
    self.contract.clone()
  }

  async fn execute(
    &self,
    inputs: ToolInputs,
    _cancel: CancellationToken,
  ) -> Result<ToolOutputs, ToolError> {
    Ok(inputs)
  }
}
