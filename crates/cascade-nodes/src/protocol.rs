use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cascade_node::{
  ExecutionState, ExecutorMetadata, NodeExecutor, NodeResult, ResolvedNode, WorkflowContext,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::ServiceError;

pub const NODE_TYPE: &str = "protocol-request";

pub const PROTOCOL_UNSUPPORTED: &str = "PROTOCOL_UNSUPPORTED";
pub const PROTOCOL_FAILED: &str = "PROTOCOL_FAILED";

/// Client for one integration protocol (e.g. `imap`, `smtp`, `ftp`).
#[async_trait]
pub trait ProtocolClient: Send + Sync {
  async fn request(
    &self,
    tenant_id: &str,
    operation: &str,
    params: &Value,
  ) -> Result<Value, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct ProtocolParams {
  protocol: String,
  operation: String,
  #[serde(default)]
  params: Value,
}

/// Dispatches `{ protocol, operation, params }` to the client registered for
/// `protocol`.
pub struct ProtocolRequestExecutor {
  clients: HashMap<String, Arc<dyn ProtocolClient>>,
}

impl ProtocolRequestExecutor {
  /// Protocol names are matched case-insensitively.
  pub fn new(clients: HashMap<String, Arc<dyn ProtocolClient>>) -> Self {
    let clients = clients
      .into_iter()
      .map(|(name, client)| (name.to_lowercase(), client))
      .collect();
    Self { clients }
  }
}

#[async_trait]
impl NodeExecutor for ProtocolRequestExecutor {
  fn node_type(&self) -> &str {
    NODE_TYPE
  }

  fn metadata(&self) -> ExecutorMetadata {
    ExecutorMetadata::new(NODE_TYPE)
      .category("integration")
      .description("Call an integration protocol client")
      .required(["protocol", "operation"])
  }

  async fn execute(
    &self,
    node: &ResolvedNode,
    context: &WorkflowContext,
    _state: &ExecutionState,
  ) -> NodeResult {
    let params: ProtocolParams = match node.parse_parameters() {
      Ok(params) => params,
      Err(result) => return result,
    };

    let Some(client) = self.clients.get(&params.protocol.to_lowercase()) else {
      return NodeResult::error(
        PROTOCOL_UNSUPPORTED,
        format!("no client for protocol '{}'", params.protocol),
      );
    };

    match client
      .request(&context.tenant_id, &params.operation, &params.params)
      .await
    {
      Ok(response) => NodeResult::success(json!({
        "protocol": params.protocol,
        "operation": params.operation,
        "response": response,
      }))
      .with_api_calls(1),
      Err(e) => {
        warn!(
          node_id = %node.node_id(),
          protocol = %params.protocol,
          operation = %params.operation,
          error = %e,
          "protocol_request_failed"
        );
        NodeResult::error(PROTOCOL_FAILED, e.to_string()).with_api_calls(1)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::run;

  struct EchoClient;

  #[async_trait]
  impl ProtocolClient for EchoClient {
    async fn request(
      &self,
      tenant_id: &str,
      operation: &str,
      params: &Value,
    ) -> Result<Value, ServiceError> {
      if operation == "fail" {
        return Err(ServiceError::Unavailable("mailbox locked".to_string()));
      }
      Ok(json!({ "tenant": tenant_id, "params": params }))
    }
  }

  fn executor() -> ProtocolRequestExecutor {
    let mut clients: HashMap<String, Arc<dyn ProtocolClient>> = HashMap::new();
    clients.insert("imap".to_string(), Arc::new(EchoClient));
    ProtocolRequestExecutor::new(clients)
  }

  #[tokio::test]
  async fn test_dispatches_by_protocol() {
    let result = run(
      &executor(),
      json!({ "protocol": "IMAP", "operation": "fetch", "params": { "folder": "INBOX" } }),
    )
    .await;
    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output["response"]["params"]["folder"], "INBOX");
    assert_eq!(result.api_calls, 1);
  }

  #[tokio::test]
  async fn test_unsupported_protocol() {
    let result = run(&executor(), json!({ "protocol": "gopher", "operation": "get" })).await;
    assert_eq!(result.error_code.as_deref(), Some(PROTOCOL_UNSUPPORTED));
    assert_eq!(result.api_calls, 0);
  }

  #[tokio::test]
  async fn test_client_failure() {
    let result = run(&executor(), json!({ "protocol": "imap", "operation": "fail" })).await;
    assert_eq!(result.error_code.as_deref(), Some(PROTOCOL_FAILED));
  }
}
