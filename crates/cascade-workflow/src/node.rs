use cascade_config::{EdgeDef, NodeDef, OnError, RetryPolicy};
use serde::{Deserialize, Serialize};

/// A node in a validated workflow.
///
/// Unlike `NodeDef`, the retry policy and timeout already include the
/// workflow-level defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub node_id: String,
  pub node_type: String,
  /// Raw parameters, possibly containing `{{ }}` placeholders.
  pub parameters: serde_json::Value,
  pub retry_policy: Option<RetryPolicy>,
  pub timeout_ms: Option<u64>,
  pub disabled: bool,
  pub on_error: OnError,
  pub skip_on_fail: bool,
  pub fallback_node_type: Option<String>,
}

impl Node {
  pub(crate) fn from_def(
    def: NodeDef,
    default_retry: Option<&RetryPolicy>,
    default_timeout_ms: Option<u64>,
  ) -> Self {
    Self {
      node_id: def.node_id,
      node_type: def.node_type,
      parameters: def.parameters,
      retry_policy: def.retry_policy.or_else(|| default_retry.cloned()),
      timeout_ms: def.timeout_ms.or(default_timeout_ms),
      disabled: def.disabled,
      on_error: def.on_error,
      skip_on_fail: def.skip_on_fail,
      fallback_node_type: def.fallback_node_type,
    }
  }

  /// Look up a raw parameter by name.
  pub fn parameter(&self, name: &str) -> Option<&serde_json::Value> {
    self.parameters.get(name)
  }
}

impl From<NodeDef> for Node {
  fn from(def: NodeDef) -> Self {
    Self::from_def(def, None, None)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
  pub from: String,
  pub to: String,
  pub label: Option<String>,
}

impl From<EdgeDef> for Edge {
  fn from(def: EdgeDef) -> Self {
    Self {
      from: def.from,
      to: def.to,
      label: def.label,
    }
  }
}
