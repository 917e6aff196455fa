use std::collections::{HashMap, HashSet};

/// Adjacency view over a validated edge set, for traversal and analysis.
#[derive(Debug, Clone)]
pub struct Graph {
  /// node_id -> downstream node_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// node_id -> upstream node_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
}

impl Graph {
  /// Build a graph from node ids and a deduplicated edge set.
  pub fn new(node_ids: &HashSet<String>, edges: &HashSet<(String, String)>) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for node_id in node_ids {
      adjacency.entry(node_id.clone()).or_default();
      reverse_adjacency.entry(node_id.clone()).or_default();
    }

    for (from, to) in edges {
      adjacency.entry(from.clone()).or_default().push(to.clone());
      reverse_adjacency
        .entry(to.clone())
        .or_default()
        .push(from.clone());
    }

    Self {
      adjacency,
      reverse_adjacency,
    }
  }

  /// Downstream nodes of `node_id`.
  pub fn downstream(&self, node_id: &str) -> &[String] {
    self
      .adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Upstream nodes of `node_id`.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }
}
