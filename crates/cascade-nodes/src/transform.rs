use async_trait::async_trait;
use cascade_node::{
  ExecutionState, ExecutorMetadata, NodeExecutor, NodeResult, ResolvedNode, WorkflowContext,
  codes,
};
use serde::Deserialize;
use serde_json::{Map, Value};

pub const NODE_TYPE: &str = "transform";

#[derive(Debug, Deserialize)]
struct TransformParams {
  #[serde(default)]
  output: Value,
  #[serde(default)]
  merge: Vec<Value>,
}

/// Returns its resolved `output` parameter.
///
/// With `merge`, the listed objects are shallow-merged in order on top of
/// `output` (which must then be an object or null).
#[derive(Debug, Default)]
pub struct TransformExecutor;

#[async_trait]
impl NodeExecutor for TransformExecutor {
  fn node_type(&self) -> &str {
    NODE_TYPE
  }

  fn metadata(&self) -> ExecutorMetadata {
    ExecutorMetadata::new(NODE_TYPE)
      .category("data")
      .description("Reshape data from earlier nodes")
  }

  async fn execute(
    &self,
    node: &ResolvedNode,
    _context: &WorkflowContext,
    _state: &ExecutionState,
  ) -> NodeResult {
    let params: TransformParams = match node.parse_parameters() {
      Ok(params) => params,
      Err(result) => return result,
    };

    if params.merge.is_empty() {
      return NodeResult::success(params.output);
    }

    let mut merged = match params.output {
      Value::Null => Map::new(),
      Value::Object(map) => map,
      _ => {
        return NodeResult::error(
          codes::INVALID_PARAMETERS,
          "'output' must be an object when 'merge' is given",
        );
      }
    };
    for (i, item) in params.merge.into_iter().enumerate() {
      match item {
        Value::Object(map) => merged.extend(map),
        Value::Null => {}
        _ => {
          return NodeResult::error(
            codes::INVALID_PARAMETERS,
            format!("merge[{i}] is not an object"),
          );
        }
      }
    }
    NodeResult::success(Value::Object(merged))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::run;
  use serde_json::json;

  #[tokio::test]
  async fn test_passes_output_through() {
    let result = run(&TransformExecutor, json!({ "output": [1, 2, 3] })).await;
    assert_eq!(result.output, json!([1, 2, 3]));
  }

  #[tokio::test]
  async fn test_merge_later_wins() {
    let result = run(
      &TransformExecutor,
      json!({
        "output": { "a": 1, "b": 1 },
        "merge": [{ "b": 2 }, null, { "c": 3 }]
      }),
    )
    .await;
    assert_eq!(result.output, json!({ "a": 1, "b": 2, "c": 3 }));
  }

  #[tokio::test]
  async fn test_merge_rejects_non_objects() {
    let result = run(&TransformExecutor, json!({ "merge": [{ "a": 1 }, 5] })).await;
    assert_eq!(result.error_code.as_deref(), Some(codes::INVALID_PARAMETERS));
  }
}
