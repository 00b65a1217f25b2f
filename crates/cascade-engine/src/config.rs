use cascade_config::RetryPolicy;
use cascade_executor::DagConfig;
use serde::{Deserialize, Serialize};

/// Engine settings, loadable from JSON. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub max_concurrency: usize,
  pub default_retry: RetryPolicy,
  pub resolution_max_attempts: u32,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub default_timeout_ms: Option<u64>,
}

impl EngineConfig {
  pub fn dag_config(&self) -> DagConfig {
    DagConfig {
      max_concurrency: self.max_concurrency,
      default_retry: self.default_retry.clone(),
      resolution_max_attempts: self.resolution_max_attempts,
      default_timeout_ms: self.default_timeout_ms,
    }
  }
}

impl Default for EngineConfig {
  fn default() -> Self {
    let dag = DagConfig::default();
    Self {
      max_concurrency: dag.max_concurrency,
      default_retry: dag.default_retry,
      resolution_max_attempts: dag.resolution_max_attempts,
      default_timeout_ms: dag.default_timeout_ms,
    }
  }
}
