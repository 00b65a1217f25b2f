use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use cascade_node::{
  ExecutionState, ExecutorMetadata, NodeExecutor, NodeResult, ResolvedNode, ValidationResult,
  WorkflowContext, validate_required,
};
use cascade_workflow::Node;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::warn;

use crate::ServiceError;

pub const READ_NODE_TYPE: &str = "dbal-read";
pub const WRITE_NODE_TYPE: &str = "dbal-write";

pub const DBAL_READ_FAILED: &str = "DBAL_READ_FAILED";
pub const DBAL_WRITE_FAILED: &str = "DBAL_WRITE_FAILED";

/// Write operations understood by `dbal-write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOperation {
  Create,
  Update,
  Delete,
}

/// Tenant-scoped record storage reached by the `dbal-*` nodes.
///
/// Records are JSON objects keyed by a string `id`.
#[async_trait]
pub trait DataStore: Send + Sync {
  /// Records of `entity` whose fields equal every field of `filter`.
  async fn find(
    &self,
    tenant_id: &str,
    entity: &str,
    filter: &Map<String, Value>,
    limit: Option<usize>,
  ) -> Result<Vec<Value>, ServiceError>;

  /// Insert a record, assigning an id when `data` has none. Returns the stored record.
  async fn create(&self, tenant_id: &str, entity: &str, data: Value) -> Result<Value, ServiceError>;

  /// Shallow-merge `data` into an existing record. Returns the updated record.
  async fn update(
    &self,
    tenant_id: &str,
    entity: &str,
    id: &str,
    data: Value,
  ) -> Result<Value, ServiceError>;

  /// Returns whether a record was removed.
  async fn delete(&self, tenant_id: &str, entity: &str, id: &str) -> Result<bool, ServiceError>;
}

type Table = BTreeMap<String, Map<String, Value>>;

/// In-memory [`DataStore`].
#[derive(Debug, Default)]
pub struct MemoryDataStore {
  /// (tenant_id, entity) -> id -> record
  tables: RwLock<HashMap<(String, String), Table>>,
}

impl MemoryDataStore {
  pub fn new() -> Self {
    Self::default()
  }
}

fn as_object(data: Value) -> Result<Map<String, Value>, ServiceError> {
  match data {
    Value::Object(map) => Ok(map),
    other => Err(ServiceError::Invalid(format!(
      "record data must be an object, got {other}"
    ))),
  }
}

fn matches(record: &Map<String, Value>, filter: &Map<String, Value>) -> bool {
  filter.iter().all(|(k, v)| record.get(k) == Some(v))
}

#[async_trait]
impl DataStore for MemoryDataStore {
  async fn find(
    &self,
    tenant_id: &str,
    entity: &str,
    filter: &Map<String, Value>,
    limit: Option<usize>,
  ) -> Result<Vec<Value>, ServiceError> {
    let tables = self.tables.read().await;
    let Some(table) = tables.get(&(tenant_id.to_string(), entity.to_string())) else {
      return Ok(Vec::new());
    };
    Ok(
      table
        .values()
        .filter(|record| matches(record, filter))
        .take(limit.unwrap_or(usize::MAX))
        .map(|record| Value::Object(record.clone()))
        .collect(),
    )
  }

  async fn create(&self, tenant_id: &str, entity: &str, data: Value) -> Result<Value, ServiceError> {
    let mut record = as_object(data)?;
    let id = match record.get("id") {
      Some(Value::String(id)) => id.clone(),
      Some(Value::Number(n)) => n.to_string(),
      Some(other) => return Err(ServiceError::Invalid(format!("invalid record id: {other}"))),
      None => {
        let id = uuid::Uuid::new_v4().to_string();
        record.insert("id".to_string(), Value::String(id.clone()));
        id
      }
    };

    let mut tables = self.tables.write().await;
    let table = tables
      .entry((tenant_id.to_string(), entity.to_string()))
      .or_default();
    if table.contains_key(&id) {
      return Err(ServiceError::Conflict(format!("{entity} '{id}' already exists")));
    }
    table.insert(id, record.clone());
    Ok(Value::Object(record))
  }

  async fn update(
    &self,
    tenant_id: &str,
    entity: &str,
    id: &str,
    data: Value,
  ) -> Result<Value, ServiceError> {
    let changes = as_object(data)?;
    let mut tables = self.tables.write().await;
    let record = tables
      .get_mut(&(tenant_id.to_string(), entity.to_string()))
      .and_then(|table| table.get_mut(id))
      .ok_or_else(|| ServiceError::NotFound(format!("{entity} '{id}'")))?;

    for (k, v) in changes {
      if k != "id" {
        record.insert(k, v);
      }
    }
    Ok(Value::Object(record.clone()))
  }

  async fn delete(&self, tenant_id: &str, entity: &str, id: &str) -> Result<bool, ServiceError> {
    let mut tables = self.tables.write().await;
    Ok(
      tables
        .get_mut(&(tenant_id.to_string(), entity.to_string()))
        .is_some_and(|table| table.remove(id).is_some()),
    )
  }
}

#[derive(Debug, Deserialize)]
struct ReadParams {
  entity: String,
  #[serde(default)]
  filter: Map<String, Value>,
  #[serde(default)]
  limit: Option<usize>,
}

/// `dbal-read`: output `{ records, count }`.
pub struct DbalReadExecutor {
  store: Arc<dyn DataStore>,
}

impl DbalReadExecutor {
  pub fn new(store: Arc<dyn DataStore>) -> Self {
    Self { store }
  }
}

#[async_trait]
impl NodeExecutor for DbalReadExecutor {
  fn node_type(&self) -> &str {
    READ_NODE_TYPE
  }

  fn metadata(&self) -> ExecutorMetadata {
    ExecutorMetadata::new(READ_NODE_TYPE)
      .category("data")
      .description("Read records of an entity")
      .required(["entity"])
  }

  async fn execute(
    &self,
    node: &ResolvedNode,
    context: &WorkflowContext,
    _state: &ExecutionState,
  ) -> NodeResult {
    let params: ReadParams = match node.parse_parameters() {
      Ok(params) => params,
      Err(result) => return result,
    };

    match self
      .store
      .find(&context.tenant_id, &params.entity, &params.filter, params.limit)
      .await
    {
      Ok(records) => {
        let count = records.len();
        NodeResult::success(json!({ "records": records, "count": count })).with_api_calls(1)
      }
      Err(e) => {
        warn!(node_id = %node.node_id(), entity = %params.entity, error = %e, "dbal_read_failed");
        NodeResult::error(DBAL_READ_FAILED, e.to_string()).with_api_calls(1)
      }
    }
  }
}

#[derive(Debug, Deserialize)]
struct WriteParams {
  entity: String,
  operation: WriteOperation,
  #[serde(default)]
  id: Option<Value>,
  #[serde(default)]
  data: Value,
}

/// `dbal-write`: create, update or delete one record.
pub struct DbalWriteExecutor {
  store: Arc<dyn DataStore>,
}

impl DbalWriteExecutor {
  pub fn new(store: Arc<dyn DataStore>) -> Self {
    Self { store }
  }
}

fn id_string(id: &Value) -> Option<String> {
  match id {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

#[async_trait]
impl NodeExecutor for DbalWriteExecutor {
  fn node_type(&self) -> &str {
    WRITE_NODE_TYPE
  }

  fn metadata(&self) -> ExecutorMetadata {
    ExecutorMetadata::new(WRITE_NODE_TYPE)
      .category("data")
      .description("Create, update or delete a record")
      .required(["entity", "operation"])
  }

  fn validate(&self, node: &Node) -> ValidationResult {
    let mut result = validate_required(node, ["entity", "operation"]);
    if let Some(Value::String(op)) = node.parameter("operation")
      && !op.contains("{{")
      && !matches!(op.as_str(), "create" | "update" | "delete")
    {
      result.push_error(format!("unknown operation '{op}'"));
    }
    result
  }

  async fn execute(
    &self,
    node: &ResolvedNode,
    context: &WorkflowContext,
    _state: &ExecutionState,
  ) -> NodeResult {
    let params: WriteParams = match node.parse_parameters() {
      Ok(params) => params,
      Err(result) => return result,
    };
    let tenant = &context.tenant_id;
    let id = params.id.as_ref().and_then(id_string);

    let outcome = match (params.operation, id) {
      (WriteOperation::Create, _) => self
        .store
        .create(tenant, &params.entity, params.data)
        .await
        .map(|record| json!({ "operation": "create", "record": record })),
      (WriteOperation::Update, Some(id)) => self
        .store
        .update(tenant, &params.entity, &id, params.data)
        .await
        .map(|record| json!({ "operation": "update", "record": record })),
      (WriteOperation::Delete, Some(id)) => self
        .store
        .delete(tenant, &params.entity, &id)
        .await
        .map(|deleted| json!({ "operation": "delete", "id": id, "deleted": deleted })),
      (_, None) => Err(ServiceError::Invalid(
        "'id' is required for update and delete".to_string(),
      )),
    };

    match outcome {
      Ok(output) => NodeResult::success(output).with_api_calls(1),
      Err(e) => {
        warn!(node_id = %node.node_id(), entity = %params.entity, error = %e, "dbal_write_failed");
        NodeResult::error(DBAL_WRITE_FAILED, e.to_string()).with_api_calls(1)
      }
    }
  }
}
