use cascade_store::StoreError;
use cascade_workflow::WorkflowError;

/// Errors returned by [`crate::ExecutionEngine`].
///
/// Node failures are not errors here; they are recorded in the execution
/// record. Only problems that prevent an execution from running, or failed
/// store lookups, surface as `EngineError`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error("invalid workflow: {0}")]
  InvalidWorkflow(#[from] WorkflowError),

  #[error("execution '{0}' is already running")]
  AlreadyRunning(String),

  #[error(transparent)]
  Store(#[from] StoreError),
}
