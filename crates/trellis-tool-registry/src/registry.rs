use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;
use trellis_tool::{Tool, ToolCategory, ToolContract};

use crate::error::RegistryError;

/// A registered tool: the contract snapshot taken at registration plus the
/// plug-in itself. The contract is queried exactly once; contracts are
/// immutable thereafter.
struct RegisteredTool {
  contract: ToolContract,
  tool: Arc<dyn Tool>,
}

/// Thread-safe catalogue of tools, keyed by unique name.
#[derive(Default)]
pub struct ToolRegistry {
  tools: RwLock<HashMap<String, RegisteredTool>>,
}

impl ToolRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a tool under its contract name.
  ///
  /// Fails with [`RegistryError::AlreadyRegistered`] on a name collision,
  /// leaving the registry untouched. Safe under concurrent callers.
  pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
    let contract = tool.contract();
    let name = contract.name.clone();

    let mut tools = self.tools.write().expect("tool registry lock poisoned");
    if tools.contains_key(&name) {
      return Err(RegistryError::AlreadyRegistered(name));
    }

    info!(tool = %name, category = ?contract.category, "registered tool");
    tools.insert(name, RegisteredTool { contract, tool });
    Ok(())
  }

  /// Get the plug-in for `name`.
  pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
    let tools = self.tools.read().expect("tool registry lock poisoned");
    tools.get(name).map(|entry| entry.tool.clone())
  }

  /// Get the contract for `name`.
  pub fn contract(&self, name: &str) -> Option<ToolContract> {
    let tools = self.tools.read().expect("tool registry lock poisoned");
    tools.get(name).map(|entry| entry.contract.clone())
  }

  pub fn contains(&self, name: &str) -> bool {
    let tools = self.tools.read().expect("tool registry lock poisoned");
    tools.contains_key(name)
  }

  /// Tool names, optionally filtered by category. Sorted by name so the
  /// order is stable within a process.
  pub fn list(&self, category: Option<ToolCategory>) -> Vec<String> {
    let tools = self.tools.read().expect("tool registry lock poisoned");
    let mut names: Vec<String> = tools
      .values()
      .filter(|entry| category.is_none_or(|c| entry.contract.category == c))
      .map(|entry| entry.contract.name.clone())
      .collect();
    names.sort();
    names
  }

  /// Every registered contract, sorted by name.
  pub fn contracts(&self) -> Vec<ToolContract> {
    let tools = self.tools.read().expect("tool registry lock poisoned");
    let mut contracts: Vec<ToolContract> =
      tools.values().map(|entry| entry.contract.clone()).collect();
    contracts.sort_by(|a, b| a.name.cmp(&b.name));
    contracts
  }

  pub fn len(&self) -> usize {
    self.tools.read().expect("tool registry lock poisoned").len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Collects tools during application wiring and builds the registry.
#[derive(Default)]
pub struct ToolRegistryBuilder {
  tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
    self.tools.push(tool);
    self
  }

  /// Build the registry; a duplicate name anywhere in the collected set
  /// fails the whole build.
  pub fn build(self) -> Result<ToolRegistry, RegistryError> {
    let registry = ToolRegistry::new();
    for tool in self.tools {
      registry.register(tool)?;
    }
    Ok(registry)
  }
}
