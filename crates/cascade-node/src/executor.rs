use async_trait::async_trait;
use cascade_workflow::Node;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::WorkflowContext;
use crate::result::{NodeResult, codes};
use crate::state::ExecutionState;
use crate::validation::{ValidationResult, validate_required};

/// Descriptive information about an executor, exposed through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorMetadata {
  pub node_type: String,
  pub version: String,
  /// e.g. `logic`, `integration`, `data`, `utility`.
  pub category: String,
  pub description: String,
  #[serde(default)]
  pub required_parameters: Vec<String>,
}

impl ExecutorMetadata {
  pub fn new(node_type: impl Into<String>) -> Self {
    Self {
      node_type: node_type.into(),
      version: "1.0.0".to_string(),
      category: "general".to_string(),
      description: String::new(),
      required_parameters: Vec::new(),
    }
  }

  pub fn category(mut self, category: impl Into<String>) -> Self {
    self.category = category.into();
    self
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  pub fn required<I, S>(mut self, parameters: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.required_parameters = parameters.into_iter().map(Into::into).collect();
    self
  }
}

/// A node together with its resolved parameters.
///
/// `node.parameters` still holds the raw templates; `parameters` is what the
/// executor should act on.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
  pub node: Node,
  pub parameters: Value,
}

impl ResolvedNode {
  pub fn new(node: Node, parameters: Value) -> Self {
    Self { node, parameters }
  }

  pub fn node_id(&self) -> &str {
    &self.node.node_id
  }

  pub fn parameter(&self, name: &str) -> Option<&Value> {
    self.parameters.get(name)
  }

  /// Deserialize the resolved parameters into the executor's own type.
  ///
  /// Fails with an `INVALID_PARAMETERS` error result ready to be returned.
  pub fn parse_parameters<T: DeserializeOwned>(&self) -> Result<T, NodeResult> {
    serde_json::from_value(self.parameters.clone()).map_err(|e| {
      NodeResult::error(
        codes::INVALID_PARAMETERS,
        format!("invalid parameters for node '{}': {e}", self.node_id()),
      )
    })
  }
}

/// Runs nodes of one type.
///
/// Business failures are returned as [`NodeResult::error`]. A panic inside
/// `execute` is treated as a defect of the executor and reported as
/// `EXECUTION_FAILED` by the DAG executor.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
  /// Registry key, e.g. `"http-request"`.
  fn node_type(&self) -> &str;

  fn metadata(&self) -> ExecutorMetadata {
    ExecutorMetadata::new(self.node_type())
  }

  /// Check the raw node configuration. Must not perform I/O.
  fn validate(&self, node: &Node) -> ValidationResult {
    validate_required(node, &self.metadata().required_parameters)
  }

  async fn execute(
    &self,
    node: &ResolvedNode,
    context: &WorkflowContext,
    state: &ExecutionState,
  ) -> NodeResult;
}
