use async_trait::async_trait;
use cascade_node::{
  ExecutionState, ExecutorMetadata, NodeExecutor, NodeResult, ResolvedNode, WorkflowContext,
};
use serde::Deserialize;
use serde_json::{Value, json};

pub const NODE_TYPE: &str = "condition";

#[derive(Debug, Deserialize)]
struct ConditionParams {
  /// Usually a resolved `{{ }}` expression.
  condition: Value,
}

/// Evaluates `condition` and selects the `"true"` or `"false"` branch.
#[derive(Debug, Default)]
pub struct ConditionExecutor;

#[async_trait]
impl NodeExecutor for ConditionExecutor {
  fn node_type(&self) -> &str {
    NODE_TYPE
  }

  fn metadata(&self) -> ExecutorMetadata {
    ExecutorMetadata::new(NODE_TYPE)
      .category("logic")
      .description("Branch on the truthiness of a value")
      .required(["condition"])
  }

  async fn execute(
    &self,
    node: &ResolvedNode,
    _context: &WorkflowContext,
    _state: &ExecutionState,
  ) -> NodeResult {
    let params: ConditionParams = match node.parse_parameters() {
      Ok(params) => params,
      Err(result) => return result,
    };

    let result = truthy(&params.condition);
    let branch = if result { "true" } else { "false" };
    NodeResult::success(json!({ "result": result, "branch": branch })).with_branch(branch)
  }
}

/// Truthiness of a resolved value.
///
/// Strings `"false"`, `"0"`, `"no"`, `"off"` and blank strings are false,
/// as are `null`, zero, and empty arrays or objects.
pub fn truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => {
      let s = s.trim();
      !(s.is_empty()
        || s.eq_ignore_ascii_case("false")
        || s == "0"
        || s.eq_ignore_ascii_case("no")
        || s.eq_ignore_ascii_case("off"))
    }
    Value::Array(items) => !items.is_empty(),
    Value::Object(map) => !map.is_empty(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::run;

  #[test]
  fn test_truthiness() {
    for value in [json!(true), json!(1), json!("yes"), json!([0]), json!({ "a": 1 })] {
      assert!(truthy(&value), "{value} should be truthy");
    }
    for value in [
      json!(false),
      json!(0),
      json!(0.0),
      json!(""),
      json!(" FALSE "),
      json!("0"),
      json!(null),
      json!([]),
      json!({}),
    ] {
      assert!(!truthy(&value), "{value} should be falsy");
    }
  }

  #[tokio::test]
  async fn test_selects_branch() {
    let result = run(&ConditionExecutor, json!({ "condition": true })).await;
    assert!(result.is_success());
    assert_eq!(result.branch.as_deref(), Some("true"));
    assert_eq!(result.output["result"], true);

    let result = run(&ConditionExecutor, json!({ "condition": "false" })).await;
    assert_eq!(result.branch.as_deref(), Some("false"));
  }

  #[tokio::test]
  async fn test_missing_condition_is_invalid() {
    let result = run(&ConditionExecutor, json!({})).await;
    assert!(result.is_error());
    assert_eq!(result.error_code.as_deref(), Some("INVALID_PARAMETERS"));
  }
}
