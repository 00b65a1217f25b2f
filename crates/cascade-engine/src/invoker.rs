use async_trait::async_trait;
use cascade_executor::{InvokeError, NodeInvoker};
use cascade_node::{ExecutionState, NodeRegistry, NodeResult, ResolvedNode, WorkflowContext};
use cascade_resolver::{Bindings, Resolver};
use cascade_workflow::Node;
use tracing::{debug, instrument};

/// Looks up the node's executor, resolves its parameters against the
/// context, prior results and trigger payload, then runs it.
#[derive(Debug)]
pub struct RegistryInvoker {
  registry: NodeRegistry,
  resolver: Resolver,
}

impl RegistryInvoker {
  pub fn new(registry: NodeRegistry) -> Self {
    Self {
      registry,
      resolver: Resolver::new(),
    }
  }

  pub fn registry(&self) -> &NodeRegistry {
    &self.registry
  }
}

#[async_trait]
impl NodeInvoker for RegistryInvoker {
  #[instrument(name = "invoke_node", skip_all, fields(node_id = %node.node_id, node_type = %node.node_type))]
  async fn invoke(
    &self,
    node: &Node,
    context: &WorkflowContext,
    state: &ExecutionState,
  ) -> Result<NodeResult, InvokeError> {
    let executor = self.registry.require(&node.node_type)?;

    let bindings = Bindings::new(
      context.template_view(),
      state.template_view(),
      context.trigger.payload.clone(),
    );
    let parameters = self.resolver.resolve(&node.parameters, &bindings)?;
    debug!("parameters_resolved");

    let resolved = ResolvedNode::new(node.clone(), parameters);
    Ok(executor.execute(&resolved, context, state).await)
  }
}
