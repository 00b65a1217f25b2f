use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cascade_config::WorkflowDef;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::warn;

use crate::types::{ExecutionRecord, ExecutionStatus};
use crate::{ExecutionStore, StoreError, newest_first};

/// Filesystem-based store.
///
/// Everything is stored as JSON:
/// ```text
/// {root}/
/// ├── executions/
/// │   └── {tenant_id}/
/// │       └── {execution_id}.json
/// └── workflows/
///     └── {tenant_id}/
///         └── {workflow_id}.json
/// ```
#[derive(Debug, Clone)]
pub struct FsStore {
  root: PathBuf,
}

impl FsStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn executions_dir(&self, tenant_id: &str) -> Result<PathBuf, StoreError> {
    Ok(self.root.join("executions").join(key(tenant_id)?))
  }

  fn execution_path(&self, execution_id: &str, tenant_id: &str) -> Result<PathBuf, StoreError> {
    Ok(
      self
        .executions_dir(tenant_id)?
        .join(format!("{}.json", key(execution_id)?)),
    )
  }

  fn workflow_path(&self, workflow_id: &str, tenant_id: &str) -> Result<PathBuf, StoreError> {
    Ok(
      self
        .root
        .join("workflows")
        .join(key(tenant_id)?)
        .join(format!("{}.json", key(workflow_id)?)),
    )
  }
}

/// Ids become file names, so anything that could escape the directory is refused.
fn key(id: &str) -> Result<&str, StoreError> {
  let invalid = id.is_empty()
    || id == "."
    || id == ".."
    || id.contains(['/', '\\', '\0'])
    || id.starts_with('.');
  if invalid {
    return Err(StoreError::InvalidKey(id.to_string()));
  }
  Ok(id)
}

async fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, StoreError> {
  let content = match fs::read_to_string(path).await {
    Ok(content) => content,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      return Err(StoreError::NotFound(what.to_string()));
    }
    Err(e) => return Err(e.into()),
  };
  Ok(serde_json::from_str(&content)?)
}

/// Write through a temporary file so readers never see a partial document.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).await?;
  }
  let content = serde_json::to_vec_pretty(value)?;
  let tmp = path.with_extension("json.tmp");
  fs::write(&tmp, content).await?;
  fs::rename(&tmp, path).await?;
  Ok(())
}

#[async_trait]
impl ExecutionStore for FsStore {
  async fn save_execution_record(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
    let path = self.execution_path(&record.id, &record.tenant_id)?;
    write_json(&path, record).await
  }

  async fn get_execution_status(
    &self,
    execution_id: &str,
    tenant_id: &str,
  ) -> Result<ExecutionRecord, StoreError> {
    let path = self.execution_path(execution_id, tenant_id)?;
    read_json(&path, &format!("execution {execution_id}")).await
  }

  async fn list_executions(
    &self,
    workflow_id: &str,
    tenant_id: &str,
    limit: usize,
  ) -> Result<Vec<ExecutionRecord>, StoreError> {
    let dir = self.executions_dir(tenant_id)?;
    let mut records = Vec::new();

    if !dir.exists() {
      return Ok(records);
    }

    let mut entries = fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().and_then(|e| e.to_str()) != Some("json") {
        continue;
      }
      let record: ExecutionRecord = match read_json(&path, "execution").await {
        Ok(record) => record,
        Err(e) => {
          warn!(path = %path.display(), error = %e, "execution_record_unreadable");
          continue;
        }
      };
      if record.workflow_id == workflow_id {
        records.push(record);
      }
    }

    Ok(newest_first(records, limit))
  }

  async fn update_execution_status(
    &self,
    execution_id: &str,
    tenant_id: &str,
    status: ExecutionStatus,
  ) -> Result<(), StoreError> {
    let mut record = self.get_execution_status(execution_id, tenant_id).await?;
    record.status = status;
    self.save_execution_record(&record).await
  }

  async fn save_workflow(&self, tenant_id: &str, workflow: &WorkflowDef) -> Result<(), StoreError> {
    let path = self.workflow_path(&workflow.workflow_id, tenant_id)?;
    write_json(&path, workflow).await
  }

  async fn load_workflow(
    &self,
    workflow_id: &str,
    tenant_id: &str,
  ) -> Result<WorkflowDef, StoreError> {
    let path = self.workflow_path(workflow_id, tenant_id)?;
    read_json(&path, &format!("workflow {workflow_id}")).await
  }
}
