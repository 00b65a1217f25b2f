use cascade_config::RetryPolicy;

/// Settings applied to every node of an execution.
#[derive(Debug, Clone, PartialEq)]
pub struct DagConfig {
  /// Maximum number of nodes running at the same time. Zero behaves as one.
  pub max_concurrency: usize,
  /// Used for nodes whose node and workflow definitions carry no policy.
  pub default_retry: RetryPolicy,
  /// Attempts allowed when parameter resolution fails, independent of the
  /// retry policy.
  pub resolution_max_attempts: u32,
  /// Used for nodes whose node and workflow definitions carry no timeout.
  pub default_timeout_ms: Option<u64>,
}

impl DagConfig {
  pub(crate) fn concurrency(&self) -> usize {
    self.max_concurrency.max(1)
  }

  pub(crate) fn resolution_attempts(&self) -> u32 {
    self.resolution_max_attempts.max(1)
  }
}

impl Default for DagConfig {
  fn default() -> Self {
    Self {
      max_concurrency: 4,
      default_retry: RetryPolicy::once(),
      resolution_max_attempts: 1,
      default_timeout_ms: None,
    }
  }
}
