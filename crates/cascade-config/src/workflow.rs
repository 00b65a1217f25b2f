use serde::{Deserialize, Serialize};

use crate::edge::EdgeDef;
use crate::node::NodeDef;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  #[serde(alias = "id")]
  pub workflow_id: String,
  pub name: String,
  #[serde(default = "default_version")]
  pub version: String,
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub edges: Vec<EdgeDef>,
  /// Retry policy for nodes that don't declare their own.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retry_policy: Option<RetryPolicy>,
  /// Per-node timeout for nodes that don't declare their own.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

impl WorkflowDef {
  pub fn new(workflow_id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      name: name.into(),
      version: default_version(),
      nodes: Vec::new(),
      edges: Vec::new(),
      retry_policy: None,
      timeout_ms: None,
    }
  }

  pub fn node(mut self, node: NodeDef) -> Self {
    self.nodes.push(node);
    self
  }

  pub fn edge(mut self, edge: EdgeDef) -> Self {
    self.edges.push(edge);
    self
  }
}

fn default_version() -> String {
  "1".to_string()
}
