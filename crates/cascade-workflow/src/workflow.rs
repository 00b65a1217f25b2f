use std::collections::HashMap;

use cascade_config::WorkflowDef;

use crate::error::WorkflowError;
use crate::graph::Graph;
use crate::node::{Edge, Node};

/// A validated workflow ready for execution.
#[derive(Debug, Clone)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  pub version: String,
  nodes: Vec<Node>,
  edges: Vec<Edge>,
  index: HashMap<String, usize>,
  graph: Graph,
}

impl Workflow {
  /// Validate a definition.
  ///
  /// Checks run in order: node ids and types, duplicate ids, edge
  /// endpoints, then acyclicity. A workflow with no nodes is valid.
  pub fn from_def(def: WorkflowDef) -> Result<Self, WorkflowError> {
    let default_retry = def.retry_policy;
    let default_timeout_ms = def.timeout_ms;

    let mut index = HashMap::with_capacity(def.nodes.len());
    let mut nodes = Vec::with_capacity(def.nodes.len());

    for (position, node_def) in def.nodes.into_iter().enumerate() {
      if node_def.node_id.trim().is_empty() {
        return Err(WorkflowError::EmptyNodeId { index: position });
      }
      if node_def.node_type.trim().is_empty() {
        return Err(WorkflowError::EmptyNodeType {
          node_id: node_def.node_id,
        });
      }
      if index.contains_key(&node_def.node_id) {
        return Err(WorkflowError::DuplicateNode(node_def.node_id));
      }

      index.insert(node_def.node_id.clone(), position);
      nodes.push(Node::from_def(
        node_def,
        default_retry.as_ref(),
        default_timeout_ms,
      ));
    }

    let edges: Vec<Edge> = def.edges.into_iter().map(Edge::from).collect();
    for edge in &edges {
      if !index.contains_key(&edge.from) || !index.contains_key(&edge.to) {
        return Err(WorkflowError::InvalidEdge {
          from: edge.from.clone(),
          to: edge.to.clone(),
        });
      }
    }

    let graph = Graph::new(&nodes, &edges);
    graph.topological_order()?;

    Ok(Self {
      workflow_id: def.workflow_id,
      name: def.name,
      version: def.version,
      nodes,
      edges,
      index,
      graph,
    })
  }

  /// Graph structure for traversal.
  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&Node> {
    self.index.get(node_id).map(|&i| &self.nodes[i])
  }

  /// Nodes in definition order.
  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  pub fn edges(&self) -> &[Edge] {
    &self.edges
  }
}

impl TryFrom<WorkflowDef> for Workflow {
  type Error = WorkflowError;

  fn try_from(def: WorkflowDef) -> Result<Self, Self::Error> {
    Self::from_def(def)
  }
}
