use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::WorkflowError;
use crate::node::{Edge, Node};

/// Graph structure for traversal and analysis.
///
/// Node order follows the definition order so traversal is deterministic.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Node ids in definition order.
  order: Vec<String>,
  /// node_id -> edges leaving that node.
  outgoing: HashMap<String, Vec<Edge>>,
  /// node_id -> edges entering that node.
  incoming: HashMap<String, Vec<Edge>>,
  /// Nodes with no incoming edges.
  entry_points: Vec<String>,
}

impl Graph {
  /// Build a graph from nodes and edges.
  pub fn new(nodes: &[Node], edges: &[Edge]) -> Self {
    let mut outgoing: HashMap<String, Vec<Edge>> = HashMap::new();
    let mut incoming: HashMap<String, Vec<Edge>> = HashMap::new();

    for node in nodes {
      outgoing.entry(node.node_id.clone()).or_default();
      incoming.entry(node.node_id.clone()).or_default();
    }

    for edge in edges {
      outgoing
        .entry(edge.from.clone())
        .or_default()
        .push(edge.clone());
      incoming.entry(edge.to.clone()).or_default().push(edge.clone());
    }

    let order: Vec<String> = nodes.iter().map(|n| n.node_id.clone()).collect();

    let entry_points = order
      .iter()
      .filter(|id| incoming.get(*id).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();

    Self {
      order,
      outgoing,
      incoming,
      entry_points,
    }
  }

  /// Get entry points (nodes with no incoming edges).
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Edges leaving a node.
  pub fn outgoing(&self, node_id: &str) -> &[Edge] {
    self
      .outgoing
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Edges entering a node.
  pub fn incoming(&self, node_id: &str) -> &[Edge] {
    self
      .incoming
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream node ids for a given node.
  pub fn upstream(&self, node_id: &str) -> impl Iterator<Item = &str> {
    self.incoming(node_id).iter().map(|e| e.from.as_str())
  }

  /// Number of inbound edges.
  pub fn in_degree(&self, node_id: &str) -> usize {
    self.incoming(node_id).len()
  }

  /// Order nodes so every node comes after all of its predecessors.
  ///
  /// Fails with [`WorkflowError::Cycle`] listing the nodes that could not be
  /// ordered when the graph contains a cycle.
  pub fn topological_order(&self) -> Result<Vec<String>, WorkflowError> {
    let mut remaining: HashMap<&str, usize> = self
      .order
      .iter()
      .map(|id| (id.as_str(), self.in_degree(id)))
      .collect();

    let mut queue: VecDeque<&str> = self.entry_points.iter().map(|s| s.as_str()).collect();
    let mut sorted = Vec::with_capacity(self.order.len());

    while let Some(id) = queue.pop_front() {
      sorted.push(id.to_string());
      for edge in self.outgoing(id) {
        if let Some(count) = remaining.get_mut(edge.to.as_str()) {
          *count -= 1;
          if *count == 0 {
            queue.push_back(edge.to.as_str());
          }
        }
      }
    }

    if sorted.len() < self.order.len() {
      let placed: HashSet<&str> = sorted.iter().map(|s| s.as_str()).collect();
      let nodes = self
        .order
        .iter()
        .filter(|id| !placed.contains(id.as_str()))
        .cloned()
        .collect();
      return Err(WorkflowError::Cycle { nodes });
    }

    Ok(sorted)
  }
}
