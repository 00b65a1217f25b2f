use cascade_node::{ExecutionMetrics, ExecutionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Success,
  Error,
  Aborted,
}

impl ExecutionStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ExecutionStatus::Success => "success",
      ExecutionStatus::Error => "error",
      ExecutionStatus::Aborted => "aborted",
    }
  }
}

impl std::fmt::Display for ExecutionStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
  Info,
  Warn,
  Error,
}

/// One line of an execution's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  pub timestamp: DateTime<Utc>,
  pub level: LogLevel,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub node_id: Option<String>,
  pub message: String,
}

/// Top-level error of a failed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
  pub message: String,
  pub code: String,
}

/// A finished execution as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
  pub id: String,
  pub workflow_id: String,
  pub tenant_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  /// Trigger kind, `manual` unless the context says otherwise.
  pub triggered_by: String,
  pub start_time: DateTime<Utc>,
  pub end_time: DateTime<Utc>,
  pub duration_ms: u64,
  pub status: ExecutionStatus,
  pub state: ExecutionState,
  pub metrics: ExecutionMetrics,
  #[serde(default)]
  pub logs: Vec<LogEntry>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<RecordError>,
}
