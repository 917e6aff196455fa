use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Semantic classification of a tool.
///
/// `Heavy` tools default to isolated execution; honouring the flag is the
/// sandbox collaborator's responsibility, not the engine's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolCategory {
  /// Lightweight utilities.
  Utility,
  /// Long-running or resource-hungry work.
  Heavy,
  /// Management and introspection operations.
  Admin,
}

/// Immutable description of a tool, queried once at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolContract {
  /// Unique name within a registry.
  pub name: String,
  /// Human-readable summary.
  pub description: String,
  pub category: ToolCategory,
  /// JSON-Schema object type for the inputs.
  pub input_schema: serde_json::Value,
  /// JSON-Schema object type for the outputs.
  pub output_schema: serde_json::Value,
  /// Tool names whose outputs typically feed this tool. Used only for
  /// schema composition, never for runtime scheduling.
  #[serde(default)]
  pub dependencies: Vec<String>,
  /// Output field name -> canonical downstream input field name. Lets the
  /// schema composer elide fields an upstream tool will provide.
  #[serde(default)]
  pub output_mappings: HashMap<String, String>,
  pub requires_isolation: bool,
}

impl ToolContract {
  /// Create a contract with empty object schemas and the category's default
  /// isolation flag (`Heavy` implies isolation).
  pub fn new(
    name: impl Into<String>,
    description: impl Into<String>,
    category: ToolCategory,
  ) -> Self {
    Self {
      name: name.into(),
      description: description.into(),
      category,
      input_schema: empty_object_schema(),
      output_schema: empty_object_schema(),
      dependencies: Vec::new(),
      output_mappings: HashMap::new(),
      requires_isolation: matches!(category, ToolCategory::Heavy),
    }
  }
}

fn empty_object_schema() -> serde_json::Value {
  serde_json::json!({ "type": "object", "properties": {} })
}
