use std::sync::Mutex;

use cascade_executor::{ExecutionEvent, ExecutionNotifier};
use cascade_store::{LogEntry, LogLevel};
use chrono::Utc;

/// Turns execution events into the log lines stored on the record.
#[derive(Debug, Default)]
pub struct LogCollector {
  entries: Mutex<Vec<LogEntry>>,
}

impl LogCollector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn into_entries(self) -> Vec<LogEntry> {
    self
      .entries
      .into_inner()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn push(&self, level: LogLevel, node_id: Option<String>, message: String) {
    self
      .entries
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .push(LogEntry {
        timestamp: Utc::now(),
        level,
        node_id,
        message,
      });
  }
}

impl ExecutionNotifier for LogCollector {
  fn notify(&self, event: ExecutionEvent) {
    match event {
      ExecutionEvent::WorkflowStarted { workflow_id, .. } => {
        self.push(LogLevel::Info, None, format!("workflow {workflow_id} started"))
      }
      ExecutionEvent::NodeStarted { node_id, .. } => {
        self.push(LogLevel::Info, Some(node_id), "node started".to_string())
      }
      ExecutionEvent::NodeCompleted {
        node_id,
        duration_ms,
        ..
      } => self.push(
        LogLevel::Info,
        Some(node_id),
        format!("node completed in {duration_ms}ms"),
      ),
      ExecutionEvent::NodeFailed {
        node_id,
        error_code,
        error,
        ..
      } => {
        let message = match error_code {
          Some(code) => format!("{code}: {error}"),
          None => error,
        };
        self.push(LogLevel::Error, Some(node_id), message)
      }
      ExecutionEvent::NodeRetrying {
        node_id,
        attempt,
        delay_ms,
        error,
        ..
      } => self.push(
        LogLevel::Warn,
        Some(node_id),
        format!("attempt {attempt} failed, retrying in {delay_ms}ms: {error}"),
      ),
      ExecutionEvent::NodeSkipped {
        node_id, reason, ..
      } => self.push(LogLevel::Info, Some(node_id), format!("skipped: {reason}")),
      ExecutionEvent::WorkflowCompleted { failed_nodes, .. } => {
        if failed_nodes == 0 {
          self.push(LogLevel::Info, None, "workflow completed".to_string())
        } else {
          self.push(
            LogLevel::Warn,
            None,
            format!("workflow completed with {failed_nodes} failed node(s)"),
          )
        }
      }
      ExecutionEvent::WorkflowCancelled { .. } => {
        self.push(LogLevel::Warn, None, "workflow cancelled".to_string())
      }
    }
  }
}
