//! Execution events and notifiers for observability.
//!
//! Events are emitted while a workflow runs so consumers can follow progress,
//! collect logs, or stream them elsewhere.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  WorkflowStarted {
    execution_id: String,
    workflow_id: String,
  },

  NodeStarted {
    execution_id: String,
    node_id: String,
  },

  /// A node finished successfully.
  NodeCompleted {
    execution_id: String,
    node_id: String,
    duration_ms: u64,
  },

  /// A node finished with an error after its last attempt.
  NodeFailed {
    execution_id: String,
    node_id: String,
    error_code: Option<String>,
    error: String,
  },

  /// A node failed and will be attempted again after `delay_ms`.
  NodeRetrying {
    execution_id: String,
    node_id: String,
    attempt: u32,
    delay_ms: u64,
    error: String,
  },

  /// A node was not run (pruned branch or disabled).
  NodeSkipped {
    execution_id: String,
    node_id: String,
    reason: String,
  },

  /// Every reachable node reached a terminal state.
  WorkflowCompleted {
    execution_id: String,
    failed_nodes: u64,
  },

  /// Cancellation stopped scheduling before all nodes ran.
  WorkflowCancelled { execution_id: String },
}

/// Receives execution events.
///
/// `notify` is called from the scheduler loop and must not block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

impl<T: ExecutionNotifier + ?Sized> ExecutionNotifier for Arc<T> {
  fn notify(&self, event: ExecutionEvent) {
    (**self).notify(event)
  }
}

impl<T: ExecutionNotifier + ?Sized> ExecutionNotifier for &T {
  fn notify(&self, event: ExecutionEvent) {
    (**self).notify(event)
  }
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls scheduling. Volume is a
  // handful of events per node.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

/// Fans every event out to two notifiers.
#[derive(Debug, Clone)]
pub struct Tee<A, B>(pub A, pub B);

impl<A: ExecutionNotifier, B: ExecutionNotifier> ExecutionNotifier for Tee<A, B> {
  fn notify(&self, event: ExecutionEvent) {
    self.0.notify(event.clone());
    self.1.notify(event);
  }
}
