use std::time::Duration;

use async_trait::async_trait;
use cascade_node::{
  ExecutionState, ExecutorMetadata, NodeExecutor, NodeResult, ResolvedNode, WorkflowContext,
};
use serde::Deserialize;
use serde_json::json;

pub const NODE_TYPE: &str = "wait";

/// One hour.
pub const MAX_WAIT_MS: u64 = 60 * 60 * 1000;

#[derive(Debug, Deserialize)]
struct WaitParams {
  duration_ms: u64,
}

/// Sleeps for `duration_ms`, capped at [`MAX_WAIT_MS`].
#[derive(Debug, Default)]
pub struct WaitExecutor;

#[async_trait]
impl NodeExecutor for WaitExecutor {
  fn node_type(&self) -> &str {
    NODE_TYPE
  }

  fn metadata(&self) -> ExecutorMetadata {
    ExecutorMetadata::new(NODE_TYPE)
      .category("utility")
      .description("Pause the branch for a duration")
      .required(["duration_ms"])
  }

  async fn execute(
    &self,
    node: &ResolvedNode,
    _context: &WorkflowContext,
    _state: &ExecutionState,
  ) -> NodeResult {
    let params: WaitParams = match node.parse_parameters() {
      Ok(params) => params,
      Err(result) => return result,
    };

    let waited_ms = params.duration_ms.min(MAX_WAIT_MS);
    tokio::time::sleep(Duration::from_millis(waited_ms)).await;

    NodeResult::success(json!({
      "waited_ms": waited_ms,
      "capped": waited_ms < params.duration_ms,
    }))
  }
}
