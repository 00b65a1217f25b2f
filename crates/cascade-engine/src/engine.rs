//! Execution engine façade.
//!
//! Turns a workflow definition and a context into a persisted
//! [`ExecutionRecord`], keeping track of running executions so they can be
//! aborted.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use cascade_config::WorkflowDef;
use cascade_executor::{DagExecutor, DagOutcome, ExecutionNotifier, NoopNotifier, Tee};
use cascade_node::{
  ExecutionMetrics, ExecutionState, NodeRegistry, NodeStatus, ValidationResult, WorkflowContext,
};
use cascade_store::{
  ExecutionRecord, ExecutionStatus, ExecutionStore, LogEntry, LogLevel, RecordError,
};
use cascade_workflow::{Workflow, WorkflowError};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{Span, error, field, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::invoker::RegistryInvoker;
use crate::logs::LogCollector;

/// Top-level error code of an execution in which some node failed.
pub const WORKFLOW_FAILED: &str = "WORKFLOW_FAILED";
/// Top-level error code of an execution that could not start.
pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";

struct RunningExecution {
  tenant_id: String,
  cancel: CancellationToken,
}

type RunningMap = Mutex<HashMap<String, RunningExecution>>;

/// Removes an execution from the running map when it goes out of scope.
struct RunningGuard<'a> {
  running: &'a RunningMap,
  execution_id: String,
}

impl Drop for RunningGuard<'_> {
  fn drop(&mut self) {
    self
      .running
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .remove(&self.execution_id);
  }
}

/// Runs workflows against a registry of executors and records the outcome.
///
/// Generic over `N: ExecutionNotifier` like the DAG executor it drives.
/// Events go to `N` and are also collected into each record's `logs`.
pub struct ExecutionEngine<N: ExecutionNotifier = NoopNotifier> {
  invoker: Arc<RegistryInvoker>,
  store: Arc<dyn ExecutionStore>,
  config: EngineConfig,
  notifier: N,
  running: RunningMap,
}

impl ExecutionEngine<NoopNotifier> {
  pub fn new(registry: NodeRegistry, store: Arc<dyn ExecutionStore>, config: EngineConfig) -> Self {
    Self::with_notifier(registry, store, config, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> ExecutionEngine<N> {
  pub fn with_notifier(
    registry: NodeRegistry,
    store: Arc<dyn ExecutionStore>,
    config: EngineConfig,
    notifier: N,
  ) -> Self {
    Self {
      invoker: Arc::new(RegistryInvoker::new(registry)),
      store,
      config,
      notifier,
      running: Mutex::new(HashMap::new()),
    }
  }

  pub fn registry(&self) -> &NodeRegistry {
    self.invoker.registry()
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Run a workflow to completion (or abort) and persist its record.
  ///
  /// Node failures are reported in the returned record. An `Err` means the
  /// workflow never ran: the definition is invalid, or an execution with the
  /// same id is already running. A failure to persist the record is logged
  /// and does not change the result.
  #[instrument(
    name = "execute_workflow",
    skip_all,
    fields(workflow_id = %def.workflow_id, execution_id = field::Empty)
  )]
  pub async fn execute_workflow(
    &self,
    def: &WorkflowDef,
    context: WorkflowContext,
  ) -> Result<ExecutionRecord, EngineError> {
    let execution_id = context
      .execution_id
      .clone()
      .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    Span::current().record("execution_id", execution_id.as_str());
    let context = context.with_execution_id(execution_id.clone());

    let start_time = Utc::now();
    let started = Instant::now();

    let workflow = match Workflow::from_def(def.clone()) {
      Ok(workflow) => workflow,
      Err(e) => {
        warn!(error = %e, "workflow_invalid");
        let record = self.invalid_record(def, &context, start_time, started, &e);
        self.persist(&record).await;
        return Err(e.into());
      }
    };

    let cancel = CancellationToken::new();
    let _guard = self.track(&execution_id, &context.tenant_id, cancel.clone())?;

    let logs = LogCollector::new();
    let outcome = {
      let dag = DagExecutor::with_notifier(
        self.config.dag_config(),
        self.invoker.clone(),
        Tee(&logs, &self.notifier),
      );
      dag.execute(&workflow, &context, &cancel).await
    };

    let record = build_record(
      &workflow,
      &context,
      outcome,
      logs.into_entries(),
      start_time,
      started,
    );

    info!(
      status = %record.status,
      duration_ms = record.duration_ms,
      failed_nodes = record.metrics.failed_nodes,
      "execution_finished"
    );

    self.persist(&record).await;
    Ok(record)
  }

  /// Load a stored workflow definition and run it.
  pub async fn run_stored_workflow(
    &self,
    workflow_id: &str,
    context: WorkflowContext,
  ) -> Result<ExecutionRecord, EngineError> {
    let def = self.load_workflow(workflow_id, &context.tenant_id).await?;
    self.execute_workflow(&def, context).await
  }

  /// Cancel a running execution owned by `tenant_id`.
  ///
  /// Returns `false` when nothing with that id is running for the tenant.
  /// Nodes already in flight finish; nothing new is scheduled.
  pub fn abort_execution(&self, execution_id: &str, tenant_id: &str) -> bool {
    let running = self
      .running
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    match running.get(execution_id) {
      Some(execution) if execution.tenant_id == tenant_id => {
        info!(execution_id, "execution_abort_requested");
        execution.cancel.cancel();
        true
      }
      _ => false,
    }
  }

  /// Ids of executions currently running for `tenant_id`.
  pub fn running_executions(&self, tenant_id: &str) -> Vec<String> {
    let running = self
      .running
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut ids: Vec<String> = running
      .iter()
      .filter(|(_, execution)| execution.tenant_id == tenant_id)
      .map(|(id, _)| id.clone())
      .collect();
    ids.sort();
    ids
  }

  /// Check a definition without running it.
  ///
  /// Structural problems are returned as an error. Otherwise every node is
  /// checked by its executor; a node type with no executor is reported as an
  /// error on that node, an unregistered fallback type as a warning.
  pub fn validate_workflow(
    &self,
    def: &WorkflowDef,
  ) -> Result<BTreeMap<String, ValidationResult>, EngineError> {
    let workflow = Workflow::from_def(def.clone())?;
    let registry = self.registry();

    Ok(
      workflow
        .nodes()
        .iter()
        .map(|node| {
          let mut result = match registry.require(&node.node_type) {
            Ok(executor) => executor.validate(node),
            Err(e) => ValidationResult::error(e.to_string()),
          };
          if let Some(fallback) = &node.fallback_node_type
            && !registry.contains(fallback)
          {
            result.push_warning(format!("fallback node type '{fallback}' is not registered"));
          }
          (node.node_id.clone(), result)
        })
        .collect(),
    )
  }

  pub fn list_executors(&self) -> Vec<String> {
    self.registry().list_executors()
  }

  pub async fn save_workflow(&self, tenant_id: &str, def: &WorkflowDef) -> Result<(), EngineError> {
    Ok(self.store.save_workflow(tenant_id, def).await?)
  }

  pub async fn load_workflow(
    &self,
    workflow_id: &str,
    tenant_id: &str,
  ) -> Result<WorkflowDef, EngineError> {
    Ok(self.store.load_workflow(workflow_id, tenant_id).await?)
  }

  pub async fn get_execution_status(
    &self,
    execution_id: &str,
    tenant_id: &str,
  ) -> Result<ExecutionRecord, EngineError> {
    Ok(
      self
        .store
        .get_execution_status(execution_id, tenant_id)
        .await?,
    )
  }

  pub async fn list_executions(
    &self,
    workflow_id: &str,
    tenant_id: &str,
    limit: usize,
  ) -> Result<Vec<ExecutionRecord>, EngineError> {
    Ok(
      self
        .store
        .list_executions(workflow_id, tenant_id, limit)
        .await?,
    )
  }

  fn track(
    &self,
    execution_id: &str,
    tenant_id: &str,
    cancel: CancellationToken,
  ) -> Result<RunningGuard<'_>, EngineError> {
    let mut running = self
      .running
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    if running.contains_key(execution_id) {
      return Err(EngineError::AlreadyRunning(execution_id.to_string()));
    }
    running.insert(
      execution_id.to_string(),
      RunningExecution {
        tenant_id: tenant_id.to_string(),
        cancel,
      },
    );
    Ok(RunningGuard {
      running: &self.running,
      execution_id: execution_id.to_string(),
    })
  }

  async fn persist(&self, record: &ExecutionRecord) {
    if let Err(e) = self.store.save_execution_record(record).await {
      error!(execution_id = %record.id, error = %e, "execution_record_save_failed");
    }
  }

  fn invalid_record(
    &self,
    def: &WorkflowDef,
    context: &WorkflowContext,
    start_time: DateTime<Utc>,
    started: Instant,
    err: &WorkflowError,
  ) -> ExecutionRecord {
    let message = err.to_string();
    ExecutionRecord {
      id: context.execution_id.clone().unwrap_or_default(),
      workflow_id: def.workflow_id.clone(),
      tenant_id: context.tenant_id.clone(),
      user_id: context.user_id.clone(),
      triggered_by: context.trigger.kind.clone(),
      start_time,
      end_time: Utc::now(),
      duration_ms: elapsed_ms(started),
      status: ExecutionStatus::Error,
      state: ExecutionState::new(),
      metrics: ExecutionMetrics::default(),
      logs: vec![LogEntry {
        timestamp: Utc::now(),
        level: LogLevel::Error,
        node_id: None,
        message: message.clone(),
      }],
      error: Some(RecordError {
        message,
        code: EXECUTION_ERROR.to_string(),
      }),
    }
  }
}

fn build_record(
  workflow: &Workflow,
  context: &WorkflowContext,
  outcome: DagOutcome,
  logs: Vec<LogEntry>,
  start_time: DateTime<Utc>,
  started: Instant,
) -> ExecutionRecord {
  let failed = outcome.state.count(NodeStatus::Error);
  let status = if outcome.aborted {
    ExecutionStatus::Aborted
  } else if failed > 0 {
    ExecutionStatus::Error
  } else {
    ExecutionStatus::Success
  };

  let error = (failed > 0).then(|| RecordError {
    message: format!("{failed} node(s) failed"),
    code: WORKFLOW_FAILED.to_string(),
  });

  ExecutionRecord {
    id: context.execution_id.clone().unwrap_or_default(),
    workflow_id: workflow.workflow_id.clone(),
    tenant_id: context.tenant_id.clone(),
    user_id: context.user_id.clone(),
    triggered_by: context.trigger.kind.clone(),
    start_time,
    end_time: Utc::now(),
    duration_ms: elapsed_ms(started),
    status,
    state: outcome.state,
    metrics: outcome.metrics,
    logs,
    error,
  }
}

fn elapsed_ms(started: Instant) -> u64 {
  u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
