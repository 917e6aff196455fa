//! Schema composition.
//!
//! A pipeline of tools auto-wires its intermediate fields: any input field
//! name that appears as a value in some tool's `output_mappings` will be
//! produced upstream, so it is elided from the user-facing schema. What
//! remains is the set of inputs only the caller can supply.
//!
//! When two tools declare the same property with different schemas, the
//! first one seen wins.

use std::collections::HashSet;

use thiserror::Error;
use trellis_tool::ToolContract;

use crate::registry::ToolRegistry;

/// How deep a dependency chain may inline before we assume a cycle.
const MAX_DEPENDENCY_DEPTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaCompositionError {
  #[error("tool '{0}' not found")]
  UnknownTool(String),

  #[error("dependency chain for '{0}' exceeds depth {MAX_DEPENDENCY_DEPTH}; cycle suspected")]
  DependencyDepthExceeded(String),
}

/// Derives user-facing input schemas from registered contracts.
pub struct SchemaComposer<'a> {
  registry: &'a ToolRegistry,
}

impl<'a> SchemaComposer<'a> {
  pub fn new(registry: &'a ToolRegistry) -> Self {
    Self { registry }
  }

  /// The tool's declared input schema, verbatim.
  pub fn standalone_schema(&self, name: &str) -> Result<serde_json::Value, SchemaCompositionError> {
    let contract = self.contract(name)?;
    Ok(contract.input_schema)
  }

  /// User-facing input schema for an ordered pipeline: every property that
  /// some pipeline tool will receive from an upstream output is removed.
  pub fn pipeline_schema<S: AsRef<str>>(
    &self,
    names: &[S],
  ) -> Result<serde_json::Value, SchemaCompositionError> {
    let mut contracts = Vec::with_capacity(names.len());
    for name in names {
      contracts.push(self.contract(name.as_ref())?);
    }
    Ok(compose(&contracts))
  }

  /// Schema for a single tool, either standalone or as the tail of the
  /// mini-pipeline formed by recursively inlining its declared
  /// dependencies.
  pub fn combined_input_schema(
    &self,
    name: &str,
    as_pipeline: bool,
  ) -> Result<serde_json::Value, SchemaCompositionError> {
    if !as_pipeline {
      return self.standalone_schema(name);
    }

    let mut ordered: Vec<String> = Vec::new();
    self.inline_dependencies(name, 0, &mut ordered)?;
    self.pipeline_schema(&ordered)
  }

  /// Depth-first expansion: dependencies first, then the tool itself, each
  /// tool kept once. The depth limit is what terminates cyclic declared
  /// dependencies.
  fn inline_dependencies(
    &self,
    name: &str,
    depth: usize,
    ordered: &mut Vec<String>,
  ) -> Result<(), SchemaCompositionError> {
    if depth > MAX_DEPENDENCY_DEPTH {
      return Err(SchemaCompositionError::DependencyDepthExceeded(
        name.to_owned(),
      ));
    }

    let contract = self.contract(name)?;
    for dependency in &contract.dependencies {
      self.inline_dependencies(dependency, depth + 1, ordered)?;
    }
    if !ordered.iter().any(|existing| existing == name) {
      ordered.push(name.to_owned());
    }
    Ok(())
  }

  fn contract(&self, name: &str) -> Result<ToolContract, SchemaCompositionError> {
    self
      .registry
      .contract(name)
      .ok_or_else(|| SchemaCompositionError::UnknownTool(name.to_owned()))
  }
}

/// The composition algorithm over an ordered contract list.
fn compose(contracts: &[ToolContract]) -> serde_json::Value {
  // Input field names some node in the pipeline will receive from an
  // upstream output.
  let provided: HashSet<&str> = contracts
    .iter()
    .flat_map(|c| c.output_mappings.values())
    .map(String::as_str)
    .collect();

  let mut properties = serde_json::Map::new();
  let mut required: Vec<String> = Vec::new();

  for contract in contracts {
    let Some(props) = contract
      .input_schema
      .get("properties")
      .and_then(|p| p.as_object())
    else {
      continue;
    };

    let declared_required: HashSet<&str> = contract
      .input_schema
      .get("required")
      .and_then(|r| r.as_array())
      .map(|entries| entries.iter().filter_map(|v| v.as_str()).collect())
      .unwrap_or_default();

    for (prop_name, prop_schema) in props {
      if provided.contains(prop_name.as_str()) || properties.contains_key(prop_name) {
        continue;
      }
      properties.insert(prop_name.clone(), prop_schema.clone());
      if declared_required.contains(prop_name.as_str()) {
        required.push(prop_name.clone());
      }
    }
  }

  serde_json::json!({
    "type": "object",
    "properties": properties,
    "required": required,
  })
}
