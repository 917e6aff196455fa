//! DAG validation and layered planning.
//!
//! Rules enforced:
//! 1. Node ids are unique within the workflow.
//! 2. Every edge and every input mapping references a declared node.
//! 3. The union of explicit and implied edges is acyclic.
//!
//! On success, nodes are grouped into batches: batch k holds the nodes
//! whose predecessors all sit in batches 1..k-1, so every batch is eligible
//! for fully concurrent dispatch.

use std::collections::{HashMap, HashSet};

use crate::error::GraphError;
use crate::graph::Graph;
use crate::spec::WorkflowSpec;

/// A layered execution plan produced by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
  batches: Vec<Vec<String>>,
  total_nodes: usize,
}

impl ExecutionPlan {
  /// Validate `spec` and compute the layered plan via Kahn's algorithm.
  pub fn build(spec: &WorkflowSpec) -> Result<Self, GraphError> {
    let mut node_ids: HashSet<String> = HashSet::with_capacity(spec.nodes.len());
    for node in &spec.nodes {
      if !node_ids.insert(node.node_id.clone()) {
        return Err(GraphError::DuplicateNode(node.node_id.clone()));
      }
    }

    let edges = combined_edges(spec, &node_ids)?;

    let mut in_degree: HashMap<&str, usize> = node_ids.iter().map(|id| (id.as_str(), 0)).collect();
    for (_, to) in &edges {
      *in_degree.entry(to.as_str()).or_insert(0) += 1;
    }

    let graph = Graph::new(&node_ids, &edges);

    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = in_degree
      .iter()
      .filter(|&(_, &degree)| degree == 0)
      .map(|(&id, _)| id.to_owned())
      .collect();

    let mut visited = 0;
    while !current.is_empty() {
      // Batch membership is a set; sort for a stable traversal order.
      current.sort();
      visited += current.len();

      let mut next: Vec<String> = Vec::new();
      for node_id in &current {
        for downstream in graph.downstream(node_id) {
          if let Some(degree) = in_degree.get_mut(downstream.as_str()) {
            *degree -= 1;
            if *degree == 0 {
              next.push(downstream.clone());
            }
          }
        }
      }

      batches.push(std::mem::take(&mut current));
      current = next;
    }

    // Any node never reaching in-degree zero sits on a cycle.
    if visited != node_ids.len() {
      return Err(GraphError::Cycle);
    }

    Ok(Self {
      batches,
      total_nodes: visited,
    })
  }

  pub fn batches(&self) -> &[Vec<String>] {
    &self.batches
  }

  pub fn total_nodes(&self) -> usize {
    self.total_nodes
  }

  pub fn is_empty(&self) -> bool {
    self.total_nodes == 0
  }
}

/// Union of explicit edges and edges implied by input mappings, with every
/// endpoint checked against the declared node set.
fn combined_edges(
  spec: &WorkflowSpec,
  node_ids: &HashSet<String>,
) -> Result<HashSet<(String, String)>, GraphError> {
  let mut edges: HashSet<(String, String)> = HashSet::new();

  for edge in &spec.edges {
    if !node_ids.contains(&edge.from) {
      return Err(GraphError::UnknownNode(edge.from.clone()));
    }
    if !node_ids.contains(&edge.to) {
      return Err(GraphError::UnknownNode(edge.to.clone()));
    }
    edges.insert((edge.from.clone(), edge.to.clone()));
  }

  for node in &spec.nodes {
    for key in node.input_mappings.keys() {
      let Some((upstream, _field)) = WorkflowSpec::split_mapping_key(key) else {
        return Err(GraphError::UnknownNode(key.clone()));
      };
      if !node_ids.contains(upstream) {
        return Err(GraphError::UnknownNode(upstream.to_owned()));
      }
      edges.insert((upstream.to_owned(), node.node_id.clone()));
    }
  }

  Ok(edges)
}
