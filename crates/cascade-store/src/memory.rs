use std::collections::HashMap;

use async_trait::async_trait;
use cascade_config::WorkflowDef;
use tokio::sync::RwLock;

use crate::types::{ExecutionRecord, ExecutionStatus};
use crate::{ExecutionStore, StoreError, newest_first};

/// In-memory store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
  /// (tenant_id, execution_id) -> record
  records: RwLock<HashMap<(String, String), ExecutionRecord>>,
  /// (tenant_id, workflow_id) -> definition
  workflows: RwLock<HashMap<(String, String), WorkflowDef>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
  async fn save_execution_record(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
    self
      .records
      .write()
      .await
      .insert((record.tenant_id.clone(), record.id.clone()), record.clone());
    Ok(())
  }

  async fn get_execution_status(
    &self,
    execution_id: &str,
    tenant_id: &str,
  ) -> Result<ExecutionRecord, StoreError> {
    self
      .records
      .read()
      .await
      .get(&key(tenant_id, execution_id))
      .cloned()
      .ok_or_else(|| StoreError::NotFound(format!("execution {execution_id}")))
  }

  async fn list_executions(
    &self,
    workflow_id: &str,
    tenant_id: &str,
    limit: usize,
  ) -> Result<Vec<ExecutionRecord>, StoreError> {
    let records = self
      .records
      .read()
      .await
      .values()
      .filter(|r| r.workflow_id == workflow_id && r.tenant_id == tenant_id)
      .cloned()
      .collect();
    Ok(newest_first(records, limit))
  }

  async fn update_execution_status(
    &self,
    execution_id: &str,
    tenant_id: &str,
    status: ExecutionStatus,
  ) -> Result<(), StoreError> {
    let mut records = self.records.write().await;
    match records.get_mut(&key(tenant_id, execution_id)) {
      Some(record) => {
        record.status = status;
        Ok(())
      }
      None => Err(StoreError::NotFound(format!("execution {execution_id}"))),
    }
  }

  async fn save_workflow(&self, tenant_id: &str, workflow: &WorkflowDef) -> Result<(), StoreError> {
    self.workflows.write().await.insert(
      (tenant_id.to_string(), workflow.workflow_id.clone()),
      workflow.clone(),
    );
    Ok(())
  }

  async fn load_workflow(
    &self,
    workflow_id: &str,
    tenant_id: &str,
  ) -> Result<WorkflowDef, StoreError> {
    self
      .workflows
      .read()
      .await
      .get(&(tenant_id.to_string(), workflow_id.to_string()))
      .cloned()
      .ok_or_else(|| StoreError::NotFound(format!("workflow {workflow_id}")))
  }
}

fn key(tenant_id: &str, id: &str) -> (String, String) {
  (tenant_id.to_string(), id.to_string())
}
