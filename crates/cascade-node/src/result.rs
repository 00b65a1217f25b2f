use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error codes produced by the engine itself rather than by node executors.
pub mod codes {
  /// Executor defect (panic or invocation failure).
  pub const EXECUTION_FAILED: &str = "EXECUTION_FAILED";
  /// A `{{ }}` placeholder in the node parameters could not be resolved.
  pub const RESOLUTION_FAILED: &str = "RESOLUTION_FAILED";
  /// No executor registered for the node type.
  pub const UNKNOWN_NODE_TYPE: &str = "UNKNOWN_NODE_TYPE";
  /// The node exceeded its timeout.
  pub const TIMEOUT: &str = "TIMEOUT";
  /// Resolved parameters don't match what the executor expects.
  pub const INVALID_PARAMETERS: &str = "INVALID_PARAMETERS";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  Success,
  Error,
  Skipped,
}

/// Outcome of running (or skipping) one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
  pub status: NodeStatus,
  #[serde(default)]
  pub output: Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_code: Option<String>,
  /// Branch label selected by the node, matched against labeled edges.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch: Option<String>,
  pub timestamp: DateTime<Utc>,
  #[serde(default)]
  pub duration_ms: u64,
  /// Attempts made, including the first.
  #[serde(default)]
  pub attempts: u32,
  /// External API calls made while producing this result.
  #[serde(default)]
  pub api_calls: u64,
}

impl NodeResult {
  fn new(status: NodeStatus) -> Self {
    Self {
      status,
      output: Value::Null,
      error: None,
      error_code: None,
      branch: None,
      timestamp: Utc::now(),
      duration_ms: 0,
      attempts: 0,
      api_calls: 0,
    }
  }

  pub fn success(output: Value) -> Self {
    Self {
      output,
      ..Self::new(NodeStatus::Success)
    }
  }

  pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      error: Some(message.into()),
      error_code: Some(code.into()),
      ..Self::new(NodeStatus::Error)
    }
  }

  pub fn skipped(reason: impl Into<String>) -> Self {
    Self {
      output: serde_json::json!({ "reason": reason.into() }),
      ..Self::new(NodeStatus::Skipped)
    }
  }

  pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
    self.branch = Some(branch.into());
    self
  }

  pub fn with_output(mut self, output: Value) -> Self {
    self.output = output;
    self
  }

  pub fn with_api_calls(mut self, api_calls: u64) -> Self {
    self.api_calls = api_calls;
    self
  }

  pub fn is_success(&self) -> bool {
    self.status == NodeStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == NodeStatus::Error
  }

  pub fn is_skipped(&self) -> bool {
    self.status == NodeStatus::Skipped
  }
}
