use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  #[serde(alias = "id")]
  pub node_id: String,
  /// Registry key of the executor that runs this node, e.g. `"http-request"`.
  #[serde(alias = "type")]
  pub node_type: String,
  #[serde(default = "empty_parameters")]
  pub parameters: serde_json::Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retry_policy: Option<RetryPolicy>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub disabled: bool,
  /// What the failure of this node means for the rest of the graph.
  #[serde(default, skip_serializing_if = "OnError::is_default")]
  pub on_error: OnError,
  /// Skip this node when any predecessor failed.
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub skip_on_fail: bool,
  /// Node type run once with the same parameters after retries are exhausted.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fallback_node_type: Option<String>,
}

/// Handling of a node that still failed after retries and fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
  /// Record the failure. Unlabeled and `error` edges stay active.
  #[default]
  Continue,
  /// Record a success with an empty object output, keeping the error message.
  ContinueRegularOutput,
  /// Record the failure and deactivate every outgoing edge.
  SkipDependents,
}

impl OnError {
  fn is_default(&self) -> bool {
    *self == OnError::Continue
  }
}

impl NodeDef {
  pub fn new(node_id: impl Into<String>, node_type: impl Into<String>) -> Self {
    Self {
      node_id: node_id.into(),
      node_type: node_type.into(),
      parameters: empty_parameters(),
      retry_policy: None,
      timeout_ms: None,
      disabled: false,
      on_error: OnError::Continue,
      skip_on_fail: false,
      fallback_node_type: None,
    }
  }

  pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
    self.parameters = parameters;
    self
  }

  pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
    self.retry_policy = Some(policy);
    self
  }

  pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
    self.timeout_ms = Some(timeout_ms);
    self
  }

  pub fn disabled(mut self) -> Self {
    self.disabled = true;
    self
  }

  pub fn on_error(mut self, on_error: OnError) -> Self {
    self.on_error = on_error;
    self
  }

  pub fn skip_on_fail(mut self) -> Self {
    self.skip_on_fail = true;
    self
  }

  pub fn with_fallback(mut self, node_type: impl Into<String>) -> Self {
    self.fallback_node_type = Some(node_type.into());
    self
  }
}

fn empty_parameters() -> serde_json::Value {
  serde_json::Value::Object(serde_json::Map::new())
}
