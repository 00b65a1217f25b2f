use async_trait::async_trait;
use cascade_node::{
  ExecutionState, ExecutorMetadata, NodeExecutor, NodeResult, ResolvedNode, ValidationResult,
  WorkflowContext, codes,
};
use cascade_workflow::Node;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

pub const NODE_TYPE: &str = "set-variable";

#[derive(Debug, Deserialize)]
struct SetVariableParams {
  #[serde(default)]
  name: Option<String>,
  #[serde(default)]
  value: Value,
  #[serde(default)]
  variables: Option<Map<String, Value>>,
}

/// Writes one (`name`/`value`) or several (`variables`) workflow variables.
///
/// Later nodes read them as `{{ context.variables.<name> }}`.
#[derive(Debug, Default)]
pub struct SetVariableExecutor;

#[async_trait]
impl NodeExecutor for SetVariableExecutor {
  fn node_type(&self) -> &str {
    NODE_TYPE
  }

  fn metadata(&self) -> ExecutorMetadata {
    ExecutorMetadata::new(NODE_TYPE)
      .category("data")
      .description("Set workflow variables")
  }

  fn validate(&self, node: &Node) -> ValidationResult {
    let has_name = matches!(node.parameter("name"), Some(Value::String(s)) if !s.is_empty());
    let has_variables = matches!(node.parameter("variables"), Some(Value::Object(_)));
    if has_name || has_variables {
      ValidationResult::ok()
    } else {
      ValidationResult::error("either 'name' or 'variables' is required")
    }
  }

  async fn execute(
    &self,
    node: &ResolvedNode,
    context: &WorkflowContext,
    _state: &ExecutionState,
  ) -> NodeResult {
    let params: SetVariableParams = match node.parse_parameters() {
      Ok(params) => params,
      Err(result) => return result,
    };

    let mut assigned = Map::new();
    if let Some(variables) = params.variables {
      assigned.extend(variables);
    }
    match params.name {
      Some(name) if !name.is_empty() => {
        assigned.insert(name, params.value);
      }
      Some(_) => return NodeResult::error(codes::INVALID_PARAMETERS, "variable name is empty"),
      None if assigned.is_empty() => {
        return NodeResult::error(
          codes::INVALID_PARAMETERS,
          "either 'name' or 'variables' is required",
        );
      }
      None => {}
    }

    debug!(node_id = %node.node_id(), count = assigned.len(), "variables_set");
    context.variables.extend(assigned.clone());
    NodeResult::success(json!({ "variables": assigned }))
  }
}
