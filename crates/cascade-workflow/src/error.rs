use thiserror::Error;

/// Structural problems in a workflow definition.
///
/// These are detected before any node runs and abort the whole execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error("node at position {index} has an empty id")]
  EmptyNodeId { index: usize },

  #[error("duplicate node id: {0}")]
  DuplicateNode(String),

  #[error("node '{node_id}' has an empty node type")]
  EmptyNodeType { node_id: String },

  #[error("edge references unknown node: from={from}, to={to}")]
  InvalidEdge { from: String, to: String },

  #[error("workflow contains a cycle involving nodes: {}", nodes.join(", "))]
  Cycle { nodes: Vec<String> },
}
