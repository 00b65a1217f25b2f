//! Dependency-ordered execution of a validated workflow.
//!
//! Nodes start once every predecessor is terminal and at least one inbound
//! edge is active. Ready nodes run concurrently up to `max_concurrency`; their
//! futures are polled from the scheduler loop, so all state writes happen in
//! one place and each invocation sees a snapshot of finished results only.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cascade_config::OnError;
use cascade_node::{
  ExecutionMetrics, ExecutionState, NodeResult, NodeStatus, WorkflowContext, codes,
};
use cascade_workflow::{Edge, Node, Workflow};
use chrono::Utc;
use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::DagConfig;
use crate::error::InvokeError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::invoker::NodeInvoker;

/// Edge label followed when the source node failed.
pub const ERROR_LABEL: &str = "error";

/// Result of running a workflow to completion or cancellation.
#[derive(Debug, Clone)]
pub struct DagOutcome {
  pub state: ExecutionState,
  pub metrics: ExecutionMetrics,
  /// Cancellation stopped scheduling before every node was reached.
  pub aborted: bool,
}

/// Walks a workflow in dependency order.
///
/// Generic over `N: ExecutionNotifier` like the engine built on top of it.
/// Use `DagExecutor::new()` to discard events or `with_notifier()` to observe them.
pub struct DagExecutor<I, N = NoopNotifier> {
  config: DagConfig,
  invoker: I,
  notifier: N,
}

impl<I: NodeInvoker> DagExecutor<I, NoopNotifier> {
  pub fn new(config: DagConfig, invoker: I) -> Self {
    Self::with_notifier(config, invoker, NoopNotifier)
  }
}

impl<I: NodeInvoker, N: ExecutionNotifier> DagExecutor<I, N> {
  pub fn with_notifier(config: DagConfig, invoker: I, notifier: N) -> Self {
    Self {
      config,
      invoker,
      notifier,
    }
  }

  pub fn config(&self) -> &DagConfig {
    &self.config
  }

  /// Run every reachable node of `workflow`.
  ///
  /// Node failures never abort the walk: a failed node's dependents still run
  /// once all of their predecessors are terminal, unless the failed node uses
  /// `OnError::SkipDependents` or the dependent is `skip_on_fail`. Cancelling
  /// `cancel` stops new nodes from being scheduled; running nodes finish.
  #[instrument(
    name = "dag_execute",
    skip_all,
    fields(workflow_id = %workflow.workflow_id, execution_id = ?context.execution_id)
  )]
  pub async fn execute(
    &self,
    workflow: &Workflow,
    context: &WorkflowContext,
    cancel: &CancellationToken,
  ) -> DagOutcome {
    let execution_id = context.execution_id.clone().unwrap_or_default();
    let mut scheduler = Scheduler::new(workflow, &execution_id, &self.notifier);

    info!(nodes = workflow.nodes().len(), "workflow_started");
    self.notifier.notify(ExecutionEvent::WorkflowStarted {
      execution_id: execution_id.clone(),
      workflow_id: workflow.workflow_id.clone(),
    });

    let mut running = FuturesUnordered::new();
    let mut aborted = false;

    loop {
      if !aborted && cancel.is_cancelled() {
        aborted = true;
        warn!(running = running.len(), "execution_cancelled");
      }

      if !aborted {
        while running.len() < self.config.concurrency() {
          let Some(node) = scheduler.ready.pop_front() else {
            break;
          };

          if node.disabled {
            scheduler.skip(node, "node is disabled");
            scheduler.release(node, true);
            continue;
          }

          self.notifier.notify(ExecutionEvent::NodeStarted {
            execution_id: execution_id.clone(),
            node_id: node.node_id.clone(),
          });
          let snapshot = scheduler.snapshot();
          running.push(self.run_node(node, context, snapshot, cancel));
        }
      }

      if running.is_empty() {
        break;
      }

      let finished = tokio::select! {
        run = running.next() => run,
        _ = cancel.cancelled(), if !aborted => None,
      };

      if let Some(run) = finished {
        let node = run.node;
        scheduler.complete(run);
        scheduler.release(node, false);
      }
    }

    if aborted {
      warn!(
        finished = scheduler.state.len(),
        total = workflow.nodes().len(),
        "workflow_cancelled"
      );
      self
        .notifier
        .notify(ExecutionEvent::WorkflowCancelled {
          execution_id: execution_id.clone(),
        });
    } else {
      info!(
        success = scheduler.metrics.success_nodes,
        failed = scheduler.metrics.failed_nodes,
        skipped = scheduler.metrics.skipped_nodes,
        "workflow_completed"
      );
      self.notifier.notify(ExecutionEvent::WorkflowCompleted {
        execution_id: execution_id.clone(),
        failed_nodes: scheduler.metrics.failed_nodes,
      });
    }

    DagOutcome {
      state: scheduler.state,
      metrics: scheduler.metrics,
      aborted,
    }
  }

  /// Run one node with its retry policy, timeout and fallback applied.
  #[instrument(
    name = "node",
    skip_all,
    fields(node_id = %node.node_id, node_type = %node.node_type)
  )]
  async fn run_node<'n>(
    &self,
    node: &'n Node,
    context: &WorkflowContext,
    snapshot: Arc<ExecutionState>,
    cancel: &CancellationToken,
  ) -> NodeRun<'n> {
    let policy = node
      .retry_policy
      .as_ref()
      .unwrap_or(&self.config.default_retry);
    let max_attempts = policy.attempts();
    let resolution_attempts = self.config.resolution_attempts();
    let timeout_ms = node.timeout_ms.or(self.config.default_timeout_ms);
    let started = Instant::now();

    let mut attempts = 0u32;
    let mut resolution_failures = 0u32;
    let mut retries = 0u32;

    let mut result = loop {
      attempts += 1;
      let result = self.attempt(node, context, &snapshot, timeout_ms).await;
      if !result.is_error() {
        break result;
      }

      let code = result.error_code.as_deref();
      let retry = match code {
        Some(codes::UNKNOWN_NODE_TYPE) => false,
        Some(codes::RESOLUTION_FAILED) => {
          resolution_failures += 1;
          resolution_failures < resolution_attempts
        }
        _ => attempts - resolution_failures < max_attempts && policy.is_retryable(code),
      };
      if !retry || cancel.is_cancelled() {
        break result;
      }

      retries += 1;
      let delay = policy.delay(retries);
      let message = result.error.clone().unwrap_or_default();
      warn!(
        attempt = attempts,
        delay_ms = millis(delay),
        error_code = code.unwrap_or_default(),
        error = %message,
        "node_retrying"
      );
      self.notifier.notify(ExecutionEvent::NodeRetrying {
        execution_id: context.execution_id.clone().unwrap_or_default(),
        node_id: node.node_id.clone(),
        attempt: attempts,
        delay_ms: millis(delay),
        error: message,
      });

      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
    };

    if result.is_error()
      && let Some(fallback) = node.fallback_node_type.as_deref()
      && !cancel.is_cancelled()
    {
      attempts += 1;
      result = self
        .fallback(node, fallback, context, &snapshot, timeout_ms, result)
        .await;
    }

    result.attempts = attempts;
    result.duration_ms = millis(started.elapsed());
    result.timestamp = Utc::now();

    NodeRun {
      node,
      result,
      retries,
    }
  }

  /// Run the node once as `fallback` with the same parameters. The node's own
  /// failure stands when the fallback fails too.
  async fn fallback(
    &self,
    node: &Node,
    fallback: &str,
    context: &WorkflowContext,
    state: &ExecutionState,
    timeout_ms: Option<u64>,
    failure: NodeResult,
  ) -> NodeResult {
    let substitute = Node {
      node_type: fallback.to_string(),
      fallback_node_type: None,
      ..node.clone()
    };

    let result = self.attempt(&substitute, context, state, timeout_ms).await;
    if result.is_error() {
      warn!(
        fallback,
        error = result.error.as_deref().unwrap_or_default(),
        "node_fallback_failed"
      );
      failure
    } else {
      info!(fallback, "node_fallback_succeeded");
      result
    }
  }

  /// A single invocation, with timeout and panic isolation.
  async fn attempt(
    &self,
    node: &Node,
    context: &WorkflowContext,
    state: &ExecutionState,
    timeout_ms: Option<u64>,
  ) -> NodeResult {
    let invocation = AssertUnwindSafe(self.invoker.invoke(node, context, state)).catch_unwind();

    let outcome = match timeout_ms {
      Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), invocation).await {
        Ok(outcome) => outcome,
        Err(_) => {
          return NodeResult::error(
            codes::TIMEOUT,
            format!("node '{}' timed out after {ms}ms", node.node_id),
          );
        }
      },
      None => invocation.await,
    };

    match outcome {
      Ok(Ok(result)) => result,
      Ok(Err(err)) => {
        if let InvokeError::Defect(_) = err {
          error!(defect = true, error = %err, "node_invocation_failed");
        }
        err.into_result()
      }
      Err(panic) => {
        let message = panic_message(panic.as_ref());
        error!(defect = true, panic = %message, "executor_panicked");
        NodeResult::error(
          codes::EXECUTION_FAILED,
          format!("executor panicked: {message}"),
        )
      }
    }
  }
}

/// Outcome of `run_node`, handed back to the scheduler loop.
struct NodeRun<'n> {
  node: &'n Node,
  result: NodeResult,
  retries: u32,
}

/// Bookkeeping for one execution. Only touched from the scheduler loop.
struct Scheduler<'a> {
  workflow: &'a Workflow,
  execution_id: &'a str,
  notifier: &'a dyn ExecutionNotifier,
  /// Inbound edges whose source is not terminal yet.
  remaining: HashMap<&'a str, usize>,
  /// Inbound edges found active so far.
  active_inbound: HashMap<&'a str, usize>,
  ready: VecDeque<&'a Node>,
  state: ExecutionState,
  snapshot: Option<Arc<ExecutionState>>,
  metrics: ExecutionMetrics,
  state_size: u64,
}

impl<'a> Scheduler<'a> {
  fn new(
    workflow: &'a Workflow,
    execution_id: &'a str,
    notifier: &'a dyn ExecutionNotifier,
  ) -> Self {
    let graph = workflow.graph();
    let remaining = workflow
      .nodes()
      .iter()
      .map(|n| (n.node_id.as_str(), graph.in_degree(&n.node_id)))
      .collect();
    let ready = graph
      .entry_points()
      .iter()
      .filter_map(|id| workflow.get_node(id))
      .collect();

    Self {
      workflow,
      execution_id,
      notifier,
      remaining,
      active_inbound: HashMap::new(),
      ready,
      state: ExecutionState::new(),
      snapshot: None,
      metrics: ExecutionMetrics::default(),
      state_size: 0,
    }
  }

  /// Shared copy of the state, rebuilt only after it changed.
  fn snapshot(&mut self) -> Arc<ExecutionState> {
    self
      .snapshot
      .get_or_insert_with(|| Arc::new(self.state.clone()))
      .clone()
  }

  fn store(&mut self, node_id: &str, result: NodeResult) {
    let size = json_size(&result);
    if let Some(previous) = self.state.insert(node_id, result) {
      self.state_size = self.state_size.saturating_sub(json_size(&previous));
    }
    self.state_size += size;
    self.metrics.peak_memory = self.metrics.peak_memory.max(self.state_size);
    self.snapshot = None;
  }

  fn complete(&mut self, run: NodeRun<'a>) {
    let NodeRun {
      node,
      result,
      retries,
    } = run;
    let node_id = node.node_id.as_str();

    let result = if result.is_error() && node.on_error == OnError::ContinueRegularOutput {
      warn!(
        node_id,
        error = result.error.as_deref().unwrap_or_default(),
        "node_error_ignored"
      );
      regular_output(result)
    } else {
      result
    };

    self.metrics.nodes_executed += 1;
    self.metrics.api_calls_made += result.api_calls;
    self.metrics.data_processed += json_size(&result.output);
    if retries > 0 {
      self.metrics.retried_nodes += 1;
      self.metrics.total_retries += u64::from(retries);
    }

    match result.status {
      NodeStatus::Success => {
        self.metrics.success_nodes += 1;
        info!(
          node_id,
          duration_ms = result.duration_ms,
          attempts = result.attempts,
          "node_completed"
        );
        self.notifier.notify(ExecutionEvent::NodeCompleted {
          execution_id: self.execution_id.to_string(),
          node_id: node_id.to_string(),
          duration_ms: result.duration_ms,
        });
      }
      NodeStatus::Error => {
        self.metrics.failed_nodes += 1;
        let message = result.error.clone().unwrap_or_default();
        error!(
          node_id,
          error_code = result.error_code.as_deref().unwrap_or_default(),
          error = %message,
          attempts = result.attempts,
          "node_failed"
        );
        self.notifier.notify(ExecutionEvent::NodeFailed {
          execution_id: self.execution_id.to_string(),
          node_id: node_id.to_string(),
          error_code: result.error_code.clone(),
          error: message,
        });
      }
      NodeStatus::Skipped => {
        self.metrics.skipped_nodes += 1;
        info!(node_id, "node_skipped");
        self.notifier.notify(ExecutionEvent::NodeSkipped {
          execution_id: self.execution_id.to_string(),
          node_id: node_id.to_string(),
          reason: "skipped by executor".to_string(),
        });
      }
    }

    self.store(node_id, result);
  }

  /// Record a node as skipped without running it.
  fn skip(&mut self, node: &Node, reason: &str) {
    self.metrics.skipped_nodes += 1;
    info!(node_id = %node.node_id, reason, "node_skipped");
    self.notifier.notify(ExecutionEvent::NodeSkipped {
      execution_id: self.execution_id.to_string(),
      node_id: node.node_id.clone(),
      reason: reason.to_string(),
    });
    self.store(&node.node_id, NodeResult::skipped(reason));
  }

  /// Whether any predecessor of `node` finished with an error.
  fn predecessor_failed(&self, node: &Node) -> bool {
    self
      .workflow
      .graph()
      .upstream(&node.node_id)
      .any(|id| self.state.get(id).is_some_and(NodeResult::is_error))
  }

  /// Settle the outgoing edges of a node that just became terminal.
  ///
  /// Targets whose inbound edges are all settled become ready, or are
  /// skipped when none of those edges is active or when they opted out of
  /// running after a failed predecessor. Skips cascade.
  fn release(&mut self, node: &'a Node, force_active: bool) {
    let workflow = self.workflow;
    let mut pending = vec![(node, force_active)];

    while let Some((source, force_active)) = pending.pop() {
      let result = self.state.get(&source.node_id);
      let blocked =
        source.on_error == OnError::SkipDependents && result.is_some_and(NodeResult::is_error);
      let settled: Vec<(&'a str, bool)> = workflow
        .graph()
        .outgoing(&source.node_id)
        .iter()
        .map(|edge| {
          let active = !blocked && (force_active || edge_active(edge, result));
          (edge.to.as_str(), active)
        })
        .collect();

      for (target, active) in settled {
        if active {
          *self.active_inbound.entry(target).or_default() += 1;
        }

        let remaining = self.remaining.entry(target).or_default();
        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
          continue;
        }

        let Some(next) = workflow.get_node(target) else {
          continue;
        };
        if self.active_inbound.get(target).copied().unwrap_or(0) == 0 {
          self.skip(next, "no active inbound edge");
          pending.push((next, false));
        } else if next.skip_on_fail && self.predecessor_failed(next) {
          self.skip(next, "predecessor failed");
          pending.push((next, false));
        } else {
          self.ready.push_back(next);
        }
      }
    }
  }
}

/// Whether `edge` lets control flow through, given its source's result.
///
/// Edges out of skipped nodes are inactive. Unlabeled edges are active for
/// any other terminal result. Labeled edges match the branch the source
/// selected; without a branch, `error` matches a failure and any other label
/// matches a success.
pub fn edge_active(edge: &Edge, source: Option<&NodeResult>) -> bool {
  let Some(result) = source else {
    return false;
  };
  if result.is_skipped() {
    return false;
  }

  match (edge.label.as_deref(), result.branch.as_deref()) {
    (None, _) => true,
    (Some(label), Some(branch)) => label == branch,
    (Some(ERROR_LABEL), None) => result.is_error(),
    (Some(_), None) => result.is_success(),
  }
}

/// A failure reported downstream as a success with an empty object output.
fn regular_output(failed: NodeResult) -> NodeResult {
  NodeResult {
    status: NodeStatus::Success,
    output: Value::Object(Map::new()),
    branch: None,
    ..failed
  }
}

fn json_size<T: Serialize + ?Sized>(value: &T) -> u64 {
  serde_json::to_vec(value)
    .map(|bytes| bytes.len() as u64)
    .unwrap_or(0)
}

fn millis(duration: Duration) -> u64 {
  u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}
