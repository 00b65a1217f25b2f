use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cascade_config::{Backoff, EdgeDef, NodeDef, OnError, RetryPolicy, WorkflowDef};
use cascade_executor::{
  ChannelNotifier, DagConfig, DagExecutor, ExecutionEvent, InvokeError, NodeInvoker,
};
use cascade_node::{ExecutionState, NodeResult, NodeStatus, WorkflowContext, codes};
use cascade_resolver::ResolveError;
use cascade_workflow::{Node, Workflow};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Behaves according to the node type:
/// - `ok`: succeeds, optionally after `sleep_ms`
/// - `fail`: fails with `code` (default `BOOM`)
/// - `flaky`: fails until attempt `succeed_on`
/// - `branch`: succeeds selecting `parameters.branch`
/// - `panic`: panics
/// - `unknown` / `unresolvable`: invocation errors
#[derive(Default)]
struct ScriptedInvoker {
  /// node_id -> node ids present in the state snapshot the node saw
  seen: Mutex<HashMap<String, Vec<String>>>,
  calls: Mutex<HashMap<String, u32>>,
  running: AtomicUsize,
  peak: AtomicUsize,
}

impl ScriptedInvoker {
  fn calls(&self, node_id: &str) -> u32 {
    self.calls.lock().unwrap().get(node_id).copied().unwrap_or(0)
  }

  fn seen(&self, node_id: &str) -> Vec<String> {
    self.seen.lock().unwrap().get(node_id).cloned().unwrap_or_default()
  }
}

#[async_trait]
impl NodeInvoker for ScriptedInvoker {
  async fn invoke(
    &self,
    node: &Node,
    _context: &WorkflowContext,
    state: &ExecutionState,
  ) -> Result<NodeResult, InvokeError> {
    let attempt = {
      let mut calls = self.calls.lock().unwrap();
      let count = calls.entry(node.node_id.clone()).or_default();
      *count += 1;
      *count
    };
    self.seen.lock().unwrap().insert(
      node.node_id.clone(),
      state.iter().map(|(id, _)| id.to_string()).collect(),
    );

    let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);

    if let Some(ms) = node.parameter("sleep_ms").and_then(|v| v.as_u64()) {
      tokio::time::sleep(Duration::from_millis(ms)).await;
    }
    self.running.fetch_sub(1, Ordering::SeqCst);

    let result = match node.node_type.as_str() {
      "ok" => NodeResult::success(json!({ "node": node.node_id })).with_api_calls(1),
      "fail" => {
        let code = node
          .parameter("code")
          .and_then(|v| v.as_str())
          .unwrap_or("BOOM");
        NodeResult::error(code, format!("{} failed", node.node_id))
      }
      "flaky" => {
        let succeed_on = node
          .parameter("succeed_on")
          .and_then(|v| v.as_u64())
          .unwrap_or(2);
        if u64::from(attempt) >= succeed_on {
          NodeResult::success(json!({ "attempt": attempt }))
        } else {
          NodeResult::error("FLAKY", "not yet")
        }
      }
      "branch" => {
        let branch = node
          .parameter("branch")
          .and_then(|v| v.as_str())
          .unwrap_or("true");
        NodeResult::success(json!({ "result": branch == "true" })).with_branch(branch)
      }
      "panic" => panic!("executor bug in {}", node.node_id),
      "unknown" => return Err(InvokeError::UnknownNodeType(node.node_type.clone())),
      "unresolvable" => {
        return Err(InvokeError::Resolution(ResolveError::MissingPath {
          path: "nodes.missing.output".to_string(),
        }));
      }
      other => NodeResult::error("UNEXPECTED", format!("unexpected type {other}")),
    };
    Ok(result)
  }
}

fn workflow(nodes: Vec<NodeDef>, edges: Vec<EdgeDef>) -> Workflow {
  let mut def = WorkflowDef::new("wf-test", "Test");
  def.nodes = nodes;
  def.edges = edges;
  Workflow::from_def(def).unwrap()
}

fn context() -> WorkflowContext {
  WorkflowContext::new("tenant-1").with_execution_id("exec-1")
}

fn executor(config: DagConfig) -> (DagExecutor<Arc<ScriptedInvoker>>, Arc<ScriptedInvoker>) {
  let invoker = Arc::new(ScriptedInvoker::default());
  (DagExecutor::new(config, invoker.clone()), invoker)
}

fn status(state: &ExecutionState, node_id: &str) -> NodeStatus {
  state.get(node_id).map(|r| r.status).unwrap()
}

fn retry(max_attempts: u32) -> RetryPolicy {
  RetryPolicy::new(max_attempts, Backoff::None)
}

#[tokio::test]
async fn test_edgeless_workflow_runs_every_node() {
  let wf = workflow(
    vec![
      NodeDef::new("a", "ok"),
      NodeDef::new("b", "ok"),
      NodeDef::new("c", "fail"),
    ],
    vec![],
  );
  let (dag, _) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  assert_eq!(outcome.state.len(), 3);
  assert!(!outcome.aborted);
  assert_eq!(outcome.metrics.nodes_executed, 3);
  assert_eq!(outcome.metrics.success_nodes, 2);
  assert_eq!(outcome.metrics.failed_nodes, 1);
}

#[tokio::test]
async fn test_nodes_start_after_all_predecessors() {
  let wf = workflow(
    vec![
      NodeDef::new("d", "ok"),
      NodeDef::new("a", "ok"),
      NodeDef::new("b", "ok").with_parameters(json!({ "sleep_ms": 30 })),
      NodeDef::new("c", "ok").with_parameters(json!({ "sleep_ms": 5 })),
    ],
    vec![
      EdgeDef::new("a", "b"),
      EdgeDef::new("a", "c"),
      EdgeDef::new("b", "d"),
      EdgeDef::new("c", "d"),
    ],
  );
  let (dag, invoker) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  assert_eq!(outcome.state.count(NodeStatus::Success), 4);
  for node in wf.nodes() {
    let seen = invoker.seen(&node.node_id);
    for upstream in wf.graph().upstream(&node.node_id) {
      assert!(
        seen.iter().any(|id| id == upstream),
        "{} started before {upstream} finished",
        node.node_id
      );
    }
  }
  assert!(invoker.seen("a").is_empty());
}

#[tokio::test]
async fn test_condition_prunes_other_branch() {
  let wf = workflow(
    vec![
      NodeDef::new("check", "branch").with_parameters(json!({ "branch": "true" })),
      NodeDef::new("yes", "ok"),
      NodeDef::new("no", "ok"),
      NodeDef::new("after-no", "ok"),
    ],
    vec![
      EdgeDef::labeled("check", "yes", "true"),
      EdgeDef::labeled("check", "no", "false"),
      EdgeDef::new("no", "after-no"),
    ],
  );
  let (dag, invoker) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  assert_eq!(status(&outcome.state, "yes"), NodeStatus::Success);
  assert_eq!(status(&outcome.state, "no"), NodeStatus::Skipped);
  assert_eq!(status(&outcome.state, "after-no"), NodeStatus::Skipped);
  assert_eq!(invoker.calls("no"), 0);
  assert_eq!(invoker.calls("after-no"), 0);
  assert_eq!(outcome.metrics.skipped_nodes, 2);
  assert_eq!(outcome.metrics.nodes_executed, 2);
}

#[tokio::test]
async fn test_join_runs_when_one_branch_active() {
  let wf = workflow(
    vec![
      NodeDef::new("check", "branch").with_parameters(json!({ "branch": "false" })),
      NodeDef::new("yes", "ok"),
      NodeDef::new("no", "ok"),
      NodeDef::new("merge", "ok"),
    ],
    vec![
      EdgeDef::labeled("check", "yes", "true"),
      EdgeDef::labeled("check", "no", "false"),
      EdgeDef::new("yes", "merge"),
      EdgeDef::new("no", "merge"),
    ],
  );
  let (dag, _) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  assert_eq!(status(&outcome.state, "yes"), NodeStatus::Skipped);
  assert_eq!(status(&outcome.state, "no"), NodeStatus::Success);
  assert_eq!(status(&outcome.state, "merge"), NodeStatus::Success);
}

#[tokio::test]
async fn test_always_failing_node_exhausts_retries() {
  let wf = workflow(vec![NodeDef::new("a", "fail").with_retry(retry(3))], vec![]);
  let (dag, invoker) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  let result = outcome.state.get("a").unwrap();
  assert_eq!(result.status, NodeStatus::Error);
  assert_eq!(result.attempts, 3);
  assert_eq!(invoker.calls("a"), 3);
  assert_eq!(outcome.metrics.retried_nodes, 1);
  assert_eq!(outcome.metrics.total_retries, 2);
  assert_eq!(outcome.metrics.failed_nodes, 1);
}

#[tokio::test]
async fn test_flaky_node_recovers() {
  let wf = workflow(
    vec![
      NodeDef::new("a", "flaky")
        .with_parameters(json!({ "succeed_on": 2 }))
        .with_retry(retry(5)),
    ],
    vec![],
  );
  let (dag, _) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  let result = outcome.state.get("a").unwrap();
  assert_eq!(result.status, NodeStatus::Success);
  assert_eq!(result.attempts, 2);
  assert_eq!(outcome.metrics.retried_nodes, 1);
  assert_eq!(outcome.metrics.total_retries, 1);
  assert_eq!(outcome.metrics.failed_nodes, 0);
}

#[tokio::test]
async fn test_retry_on_skips_other_codes() {
  let wf = workflow(
    vec![
      NodeDef::new("a", "fail")
        .with_parameters(json!({ "code": "HTTP_4xx" }))
        .with_retry(retry(3).retry_on([codes::TIMEOUT, "HTTP_5xx"])),
    ],
    vec![],
  );
  let (dag, invoker) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  assert_eq!(invoker.calls("a"), 1);
  assert_eq!(outcome.metrics.retried_nodes, 0);
}

#[tokio::test]
async fn test_default_retry_from_config() {
  let wf = workflow(vec![NodeDef::new("a", "fail")], vec![]);
  let config = DagConfig {
    default_retry: retry(2),
    ..DagConfig::default()
  };
  let (dag, invoker) = executor(config);

  dag.execute(&wf, &context(), &CancellationToken::new()).await;

  assert_eq!(invoker.calls("a"), 2);
}

#[tokio::test]
async fn test_timeout_produces_timeout_error() {
  let wf = workflow(
    vec![
      NodeDef::new("slow", "ok")
        .with_parameters(json!({ "sleep_ms": 500 }))
        .with_timeout_ms(20),
    ],
    vec![],
  );
  let (dag, _) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  let result = outcome.state.get("slow").unwrap();
  assert_eq!(result.status, NodeStatus::Error);
  assert_eq!(result.error_code.as_deref(), Some(codes::TIMEOUT));
}

#[tokio::test]
async fn test_panic_is_isolated_and_dependents_still_run() {
  let wf = workflow(
    vec![NodeDef::new("bad", "panic"), NodeDef::new("next", "ok")],
    vec![EdgeDef::new("bad", "next")],
  );
  let (dag, _) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  let bad = outcome.state.get("bad").unwrap();
  assert_eq!(bad.error_code.as_deref(), Some(codes::EXECUTION_FAILED));
  assert!(bad.error.as_deref().unwrap().contains("executor bug in bad"));
  assert_eq!(status(&outcome.state, "next"), NodeStatus::Success);
}

#[tokio::test]
async fn test_error_edges_route_failures() {
  let wf = workflow(
    vec![
      NodeDef::new("call", "fail"),
      NodeDef::new("on-error", "ok"),
      NodeDef::new("on-success", "ok"),
    ],
    vec![
      EdgeDef::labeled("call", "on-error", "error"),
      EdgeDef::labeled("call", "on-success", "success"),
    ],
  );
  let (dag, _) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  assert_eq!(status(&outcome.state, "on-error"), NodeStatus::Success);
  assert_eq!(status(&outcome.state, "on-success"), NodeStatus::Skipped);
}

#[tokio::test]
async fn test_disabled_node_is_skipped_without_blocking() {
  let wf = workflow(
    vec![
      NodeDef::new("a", "ok"),
      NodeDef::new("b", "fail").disabled(),
      NodeDef::new("c", "ok"),
    ],
    vec![EdgeDef::new("a", "b"), EdgeDef::new("b", "c")],
  );
  let (dag, invoker) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  assert_eq!(status(&outcome.state, "b"), NodeStatus::Skipped);
  assert_eq!(status(&outcome.state, "c"), NodeStatus::Success);
  assert_eq!(invoker.calls("b"), 0);
  assert_eq!(outcome.metrics.skipped_nodes, 1);
}

#[tokio::test]
async fn test_unknown_node_type_is_not_retried() {
  let wf = workflow(vec![NodeDef::new("a", "unknown").with_retry(retry(3))], vec![]);
  let (dag, invoker) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  let result = outcome.state.get("a").unwrap();
  assert_eq!(result.error_code.as_deref(), Some(codes::UNKNOWN_NODE_TYPE));
  assert_eq!(invoker.calls("a"), 1);
}

#[tokio::test]
async fn test_resolution_failures_use_their_own_budget() {
  let wf = workflow(
    vec![NodeDef::new("a", "unresolvable").with_retry(retry(5))],
    vec![],
  );
  let config = DagConfig {
    resolution_max_attempts: 2,
    ..DagConfig::default()
  };
  let (dag, invoker) = executor(config);

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  let result = outcome.state.get("a").unwrap();
  assert_eq!(result.error_code.as_deref(), Some(codes::RESOLUTION_FAILED));
  assert_eq!(invoker.calls("a"), 2);
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() {
  let wf = workflow(vec![NodeDef::new("a", "ok")], vec![]);
  let (dag, invoker) = executor(DagConfig::default());
  let cancel = CancellationToken::new();
  cancel.cancel();

  let outcome = dag.execute(&wf, &context(), &cancel).await;

  assert!(outcome.aborted);
  assert!(outcome.state.is_empty());
  assert_eq!(invoker.calls("a"), 0);
}

#[tokio::test]
async fn test_cancel_lets_running_node_finish() {
  let wf = workflow(
    vec![
      NodeDef::new("first", "ok").with_parameters(json!({ "sleep_ms": 60 })),
      NodeDef::new("second", "ok"),
    ],
    vec![EdgeDef::new("first", "second")],
  );
  let (dag, invoker) = executor(DagConfig::default());
  let cancel = CancellationToken::new();

  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(10)).await;
    trigger.cancel();
  });

  let outcome = dag.execute(&wf, &context(), &cancel).await;

  assert!(outcome.aborted);
  assert_eq!(status(&outcome.state, "first"), NodeStatus::Success);
  assert!(outcome.state.get("second").is_none());
  assert_eq!(invoker.calls("second"), 0);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
  let nodes = (0..6)
    .map(|i| NodeDef::new(format!("n{i}"), "ok").with_parameters(json!({ "sleep_ms": 15 })))
    .collect();
  let wf = workflow(nodes, vec![]);
  let config = DagConfig {
    max_concurrency: 2,
    ..DagConfig::default()
  };
  let (dag, invoker) = executor(config);

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  assert_eq!(outcome.state.len(), 6);
  assert!(invoker.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_metrics_track_data_and_api_calls() {
  let wf = workflow(
    vec![NodeDef::new("a", "ok"), NodeDef::new("b", "ok")],
    vec![EdgeDef::new("a", "b")],
  );
  let (dag, _) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  let output_size = serde_json::to_vec(&json!({ "node": "a" })).unwrap().len() as u64;
  assert_eq!(outcome.metrics.api_calls_made, 2);
  assert_eq!(outcome.metrics.data_processed, output_size * 2);
  assert!(outcome.metrics.peak_memory >= outcome.metrics.data_processed);
}

#[tokio::test]
async fn test_events_are_emitted() {
  let wf = workflow(
    vec![
      NodeDef::new("a", "flaky").with_retry(retry(2)),
      NodeDef::new("b", "ok").disabled(),
    ],
    vec![EdgeDef::new("a", "b")],
  );
  let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
  let invoker = Arc::new(ScriptedInvoker::default());
  let dag = DagExecutor::with_notifier(DagConfig::default(), invoker, ChannelNotifier::new(tx));

  dag.execute(&wf, &context(), &CancellationToken::new()).await;
  drop(dag);

  let mut events = Vec::new();
  while let Some(event) = rx.recv().await {
    events.push(event);
  }

  assert!(matches!(
    events.first(),
    Some(ExecutionEvent::WorkflowStarted { workflow_id, .. }) if workflow_id == "wf-test"
  ));
  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::NodeRetrying { node_id, attempt: 1, .. } if node_id == "a"
  )));
  assert!(events.iter().any(|e| matches!(
    e,
    ExecutionEvent::NodeSkipped { node_id, .. } if node_id == "b"
  )));
  assert!(matches!(
    events.last(),
    Some(ExecutionEvent::WorkflowCompleted { failed_nodes: 0, .. })
  ));
}

#[tokio::test]
async fn test_empty_workflow_completes() {
  let wf = workflow(vec![], vec![]);
  let (dag, _) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  assert!(outcome.state.is_empty());
  assert!(!outcome.aborted);
  assert_eq!(outcome.metrics.nodes_executed, 0);
}

#[tokio::test]
async fn test_fallback_replaces_exhausted_failure() {
  let wf = workflow(
    vec![
      NodeDef::new("a", "fail")
        .with_retry(retry(2))
        .with_fallback("ok"),
      NodeDef::new("b", "ok"),
    ],
    vec![EdgeDef::new("a", "b")],
  );
  let (dag, invoker) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  let result = outcome.state.get("a").unwrap();
  assert_eq!(result.status, NodeStatus::Success);
  assert_eq!(result.output, json!({ "node": "a" }));
  assert_eq!(result.attempts, 3);
  assert_eq!(invoker.calls("a"), 3);
  assert_eq!(status(&outcome.state, "b"), NodeStatus::Success);
  assert_eq!(outcome.metrics.failed_nodes, 0);
}

#[tokio::test]
async fn test_failed_fallback_keeps_first_error() {
  let wf = workflow(
    vec![
      NodeDef::new("a", "fail")
        .with_parameters(json!({ "code": "HTTP_5xx" }))
        .with_fallback("unknown"),
    ],
    vec![],
  );
  let (dag, invoker) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  let result = outcome.state.get("a").unwrap();
  assert_eq!(result.status, NodeStatus::Error);
  assert_eq!(result.error_code.as_deref(), Some("HTTP_5xx"));
  assert_eq!(result.attempts, 2);
  assert_eq!(invoker.calls("a"), 2);
}

#[tokio::test]
async fn test_continue_regular_output_routes_as_success() {
  let wf = workflow(
    vec![
      NodeDef::new("a", "fail").on_error(OnError::ContinueRegularOutput),
      NodeDef::new("on-success", "ok"),
      NodeDef::new("on-error", "ok"),
    ],
    vec![
      EdgeDef::labeled("a", "on-success", "success"),
      EdgeDef::labeled("a", "on-error", "error"),
    ],
  );
  let (dag, invoker) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  let result = outcome.state.get("a").unwrap();
  assert_eq!(result.status, NodeStatus::Success);
  assert_eq!(result.output, json!({}));
  assert_eq!(result.error_code.as_deref(), Some("BOOM"));
  assert_eq!(status(&outcome.state, "on-success"), NodeStatus::Success);
  assert_eq!(status(&outcome.state, "on-error"), NodeStatus::Skipped);
  assert_eq!(invoker.calls("on-error"), 0);
  assert_eq!(outcome.metrics.failed_nodes, 0);
}

#[tokio::test]
async fn test_skip_dependents_prunes_every_outgoing_edge() {
  let wf = workflow(
    vec![
      NodeDef::new("a", "fail").on_error(OnError::SkipDependents),
      NodeDef::new("next", "ok"),
      NodeDef::new("handler", "ok"),
      NodeDef::new("after", "ok"),
    ],
    vec![
      EdgeDef::new("a", "next"),
      EdgeDef::labeled("a", "handler", "error"),
      EdgeDef::new("next", "after"),
    ],
  );
  let (dag, invoker) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  assert_eq!(status(&outcome.state, "a"), NodeStatus::Error);
  assert_eq!(status(&outcome.state, "next"), NodeStatus::Skipped);
  assert_eq!(status(&outcome.state, "handler"), NodeStatus::Skipped);
  assert_eq!(status(&outcome.state, "after"), NodeStatus::Skipped);
  assert_eq!(invoker.calls("next") + invoker.calls("handler"), 0);
  assert_eq!(outcome.metrics.skipped_nodes, 3);
}

#[tokio::test]
async fn test_skip_on_fail_waits_out_failed_predecessor() {
  let wf = workflow(
    vec![
      NodeDef::new("left", "ok"),
      NodeDef::new("right", "fail"),
      NodeDef::new("strict", "ok").skip_on_fail(),
      NodeDef::new("lenient", "ok"),
      NodeDef::new("after-strict", "ok"),
    ],
    vec![
      EdgeDef::new("left", "strict"),
      EdgeDef::new("right", "strict"),
      EdgeDef::new("left", "lenient"),
      EdgeDef::new("right", "lenient"),
      EdgeDef::new("strict", "after-strict"),
    ],
  );
  let (dag, invoker) = executor(DagConfig::default());

  let outcome = dag.execute(&wf, &context(), &CancellationToken::new()).await;

  let strict = outcome.state.get("strict").unwrap();
  assert_eq!(strict.status, NodeStatus::Skipped);
  assert_eq!(strict.output, json!({ "reason": "predecessor failed" }));
  assert_eq!(invoker.calls("strict"), 0);
  assert_eq!(status(&outcome.state, "after-strict"), NodeStatus::Skipped);
  assert_eq!(status(&outcome.state, "lenient"), NodeStatus::Success);
}
