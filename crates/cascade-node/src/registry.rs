use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::executor::{ExecutorMetadata, NodeExecutor};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
  #[error("no executor registered for node type '{0}'")]
  NotFound(String),
}

/// A registered executor and its metadata.
#[derive(Clone)]
pub struct RegistryEntry {
  pub executor: Arc<dyn NodeExecutor>,
  pub metadata: ExecutorMetadata,
}

impl std::fmt::Debug for RegistryEntry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RegistryEntry")
      .field("metadata", &self.metadata)
      .finish_non_exhaustive()
  }
}

/// Executors by node type.
///
/// Cloning is cheap and shares the same registrations, so a registry can be
/// built once and handed to several engines.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
  entries: Arc<RwLock<HashMap<String, RegistryEntry>>>,
}

impl NodeRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  fn read(&self) -> RwLockReadGuard<'_, HashMap<String, RegistryEntry>> {
    self
      .entries
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RegistryEntry>> {
    self
      .entries
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Register an executor under its node type. A later registration for the
  /// same type replaces the earlier one.
  pub fn register(&self, executor: Arc<dyn NodeExecutor>) {
    let metadata = executor.metadata();
    let node_type = executor.node_type().to_string();

    let previous = self
      .write()
      .insert(node_type.clone(), RegistryEntry { executor, metadata });

    if previous.is_some() {
      warn!(node_type = %node_type, "executor_replaced");
    } else {
      debug!(node_type = %node_type, "executor_registered");
    }
  }

  /// Register several executors in order; last write wins per node type.
  pub fn register_batch<I>(&self, executors: I)
  where
    I: IntoIterator<Item = Arc<dyn NodeExecutor>>,
  {
    for executor in executors {
      self.register(executor);
    }
  }

  pub fn get(&self, node_type: &str) -> Option<Arc<dyn NodeExecutor>> {
    self.read().get(node_type).map(|e| e.executor.clone())
  }

  /// Like [`get`](Self::get), but missing types are an error.
  pub fn require(&self, node_type: &str) -> Result<Arc<dyn NodeExecutor>, RegistryError> {
    self
      .get(node_type)
      .ok_or_else(|| RegistryError::NotFound(node_type.to_string()))
  }

  pub fn metadata(&self, node_type: &str) -> Option<ExecutorMetadata> {
    self.read().get(node_type).map(|e| e.metadata.clone())
  }

  pub fn contains(&self, node_type: &str) -> bool {
    self.read().contains_key(node_type)
  }

  /// Registered node types, sorted.
  pub fn list_executors(&self) -> Vec<String> {
    let mut types: Vec<String> = self.read().keys().cloned().collect();
    types.sort();
    types
  }

  pub fn unregister(&self, node_type: &str) -> Option<RegistryEntry> {
    self.write().remove(node_type)
  }

  pub fn len(&self) -> usize {
    self.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.read().is_empty()
  }
}
