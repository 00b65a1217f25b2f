use serde::{Deserialize, Serialize};

/// Counters collected over one execution.
///
/// Sizes are in bytes of serialized JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
  /// Nodes that were actually invoked (skipped nodes excluded).
  pub nodes_executed: u64,
  pub success_nodes: u64,
  pub failed_nodes: u64,
  /// Nodes that needed at least one retry.
  pub retried_nodes: u64,
  pub total_retries: u64,
  pub skipped_nodes: u64,
  /// Largest size the execution state reached.
  pub peak_memory: u64,
  /// Total size of node outputs written to state.
  pub data_processed: u64,
  pub api_calls_made: u64,
}
