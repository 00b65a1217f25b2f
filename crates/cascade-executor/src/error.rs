use cascade_node::{NodeResult, RegistryError, codes};
use cascade_resolver::ResolveError;

/// Failures while preparing or dispatching a node, before or around the
/// executor itself.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
  #[error("no executor registered for node type '{0}'")]
  UnknownNodeType(String),

  #[error("failed to resolve parameters: {0}")]
  Resolution(#[from] ResolveError),

  /// The invocation machinery itself failed.
  #[error("node invocation failed: {0}")]
  Defect(String),
}

impl From<RegistryError> for InvokeError {
  fn from(err: RegistryError) -> Self {
    match err {
      RegistryError::NotFound(node_type) => InvokeError::UnknownNodeType(node_type),
    }
  }
}

impl InvokeError {
  pub fn code(&self) -> &'static str {
    match self {
      InvokeError::UnknownNodeType(_) => codes::UNKNOWN_NODE_TYPE,
      InvokeError::Resolution(_) => codes::RESOLUTION_FAILED,
      InvokeError::Defect(_) => codes::EXECUTION_FAILED,
    }
  }

  /// Convert into the error result recorded for the node.
  pub fn into_result(self) -> NodeResult {
    NodeResult::error(self.code(), self.to_string())
  }
}
