use std::sync::Arc;

use async_trait::async_trait;
use cascade_node::{ExecutionState, NodeResult, WorkflowContext};
use cascade_workflow::Node;

use crate::error::InvokeError;

/// Runs a single node: resolves its parameters and calls its executor.
///
/// The DAG executor only sequences nodes; everything that knows about
/// executors and templates sits behind this trait.
#[async_trait]
pub trait NodeInvoker: Send + Sync {
  async fn invoke(
    &self,
    node: &Node,
    context: &WorkflowContext,
    state: &ExecutionState,
  ) -> Result<NodeResult, InvokeError>;
}

#[async_trait]
impl<T: NodeInvoker + ?Sized> NodeInvoker for Arc<T> {
  async fn invoke(
    &self,
    node: &Node,
    context: &WorkflowContext,
    state: &ExecutionState,
  ) -> Result<NodeResult, InvokeError> {
    (**self).invoke(node, context, state).await
  }
}
