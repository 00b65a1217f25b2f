use std::collections::HashMap;

use async_trait::async_trait;
use cascade_node::{
  ExecutionState, ExecutorMetadata, NodeExecutor, NodeResult, ResolvedNode, WorkflowContext,
  codes,
};
use serde::Deserialize;
use serde_json::{Value, json};

pub const NODE_TYPE: &str = "webhook-response";

#[derive(Debug, Deserialize)]
struct WebhookResponseParams {
  #[serde(default = "default_status")]
  status_code: u16,
  #[serde(default)]
  headers: HashMap<String, String>,
  #[serde(default)]
  body: Value,
}

fn default_status() -> u16 {
  200
}

/// Describes the response to send back to a webhook caller.
///
/// The engine only records it; delivering it is up to whoever triggered the
/// execution.
#[derive(Debug, Default)]
pub struct WebhookResponseExecutor;

#[async_trait]
impl NodeExecutor for WebhookResponseExecutor {
  fn node_type(&self) -> &str {
    NODE_TYPE
  }

  fn metadata(&self) -> ExecutorMetadata {
    ExecutorMetadata::new(NODE_TYPE)
      .category("integration")
      .description("Build the response for a webhook trigger")
  }

  async fn execute(
    &self,
    node: &ResolvedNode,
    _context: &WorkflowContext,
    _state: &ExecutionState,
  ) -> NodeResult {
    let params: WebhookResponseParams = match node.parse_parameters() {
      Ok(params) => params,
      Err(result) => return result,
    };

    if !(100..=599).contains(&params.status_code) {
      return NodeResult::error(
        codes::INVALID_PARAMETERS,
        format!("invalid status code {}", params.status_code),
      );
    }

    NodeResult::success(json!({
      "status_code": params.status_code,
      "headers": params.headers,
      "body": params.body,
    }))
  }
}
