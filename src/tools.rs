//! Built-in utility tools registered during application wiring.
//!
//! Real tools are plug-ins; these two exist so the CLI is exercisable out
//! of the box.

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use trellis_tool::{Tool, ToolCategory, ToolContract, ToolError, ToolInputs, ToolOutputs};

/// Returns its inputs verbatim.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
  fn contract(&self) -> ToolContract {
    let mut contract = ToolContract::new(
      "echo",
      "Return the provided inputs unchanged",
      ToolCategory::Utility,
    );
    contract.input_schema = json!({ "type": "object" });
    contract.output_schema = json!({ "type": "object" });
    contract
  }

  async fn execute(
    &self,
    inputs: ToolInputs,
    _cancel: CancellationToken,
  ) -> Result<ToolOutputs, ToolError> {
    Ok(inputs)
  }
}

/// Mints a fresh opaque identifier.
pub struct MakeIdTool;

#[async_trait]
impl Tool for MakeIdTool {
  fn contract(&self) -> ToolContract {
    let mut contract = ToolContract::new(
      "make_id",
      "Generate a unique identifier",
      ToolCategory::Utility,
    );
    contract.input_schema = json!({
      "type": "object",
      "properties": {
        "prefix": { "type": "string", "description": "Optional identifier prefix" }
      }
    });
    contract.output_schema = json!({
      "type": "object",
      "properties": { "id": { "type": "string" } },
      "required": ["id"]
    });
    contract
      .output_mappings
      .insert("id".to_owned(), "id".to_owned());
    contract
  }

  async fn execute(
    &self,
    inputs: ToolInputs,
    _cancel: CancellationToken,
  ) -> Result<ToolOutputs, ToolError> {
    let id = uuid::Uuid::new_v4().to_string();
    let id = match inputs.get("prefix").and_then(|p| p.as_str()) {
      Some(prefix) => format!("{prefix}_{id}"),
      None => id,
    };

    let mut outputs = ToolOutputs::new();
    outputs.insert("id".to_owned(), json!(id));
    Ok(outputs)
  }
}
