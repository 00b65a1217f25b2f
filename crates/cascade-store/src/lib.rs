//! Cascade Store
//!
//! Storage trait for execution records and workflow definitions, with an
//! in-memory implementation and a JSON-file implementation.
//!
//! Every lookup is scoped to a tenant: records and workflows saved under one
//! tenant are reported as not found for any other.

mod fs;
mod memory;
mod types;

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use types::{ExecutionRecord, ExecutionStatus, LogEntry, LogLevel, RecordError};

use async_trait::async_trait;
use cascade_config::WorkflowDef;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// An id that can't be used as a storage key.
  #[error("invalid key: {0}")]
  InvalidKey(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// The backing store refused the operation.
  #[error("store unavailable: {0}")]
  Unavailable(String),
}

/// Storage for execution records and workflow definitions.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
  /// Insert or replace an execution record.
  async fn save_execution_record(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

  /// Get an execution record by id.
  async fn get_execution_status(
    &self,
    execution_id: &str,
    tenant_id: &str,
  ) -> Result<ExecutionRecord, StoreError>;

  /// Records of one workflow, newest first, at most `limit`.
  async fn list_executions(
    &self,
    workflow_id: &str,
    tenant_id: &str,
    limit: usize,
  ) -> Result<Vec<ExecutionRecord>, StoreError>;

  /// Change the status of a stored record.
  async fn update_execution_status(
    &self,
    execution_id: &str,
    tenant_id: &str,
    status: ExecutionStatus,
  ) -> Result<(), StoreError>;

  async fn save_workflow(&self, tenant_id: &str, workflow: &WorkflowDef) -> Result<(), StoreError>;

  async fn load_workflow(&self, workflow_id: &str, tenant_id: &str)
  -> Result<WorkflowDef, StoreError>;
}

/// Newest first, truncated to `limit`.
pub(crate) fn newest_first(mut records: Vec<ExecutionRecord>, limit: usize) -> Vec<ExecutionRecord> {
  records.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| b.id.cmp(&a.id)));
  records.truncate(limit);
  records
}
