use std::sync::{Arc, RwLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};

/// Workflow variables shared by every node of one execution.
///
/// Cloning shares the underlying map. Written by `set-variable` nodes,
/// read by templates through `context.variables`.
#[derive(Debug, Clone, Default)]
pub struct Variables {
  inner: Arc<RwLock<Map<String, Value>>>,
}

impl Variables {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, name: &str) -> Option<Value> {
    self
      .inner
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .get(name)
      .cloned()
  }

  /// Set a variable, returning the previous value.
  pub fn set(&self, name: impl Into<String>, value: Value) -> Option<Value> {
    self
      .inner
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .insert(name.into(), value)
  }

  pub fn extend(&self, values: Map<String, Value>) {
    self
      .inner
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .extend(values);
  }

  /// Copy of the current variables.
  pub fn snapshot(&self) -> Map<String, Value> {
    self
      .inner
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .clone()
  }
}

impl From<Map<String, Value>> for Variables {
  fn from(values: Map<String, Value>) -> Self {
    Self {
      inner: Arc::new(RwLock::new(values)),
    }
  }
}

impl Serialize for Variables {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.snapshot().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for Variables {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    Map::deserialize(deserializer).map(Self::from)
  }
}

/// What started an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
  /// e.g. `manual`, `webhook`, `schedule`.
  #[serde(default = "default_trigger_kind")]
  pub kind: String,
  #[serde(default)]
  pub payload: Value,
  #[serde(default)]
  pub metadata: Map<String, Value>,
}

impl Trigger {
  pub fn new(kind: impl Into<String>, payload: Value) -> Self {
    Self {
      kind: kind.into(),
      payload,
      metadata: Map::new(),
    }
  }

  pub fn manual(payload: Value) -> Self {
    Self::new(default_trigger_kind(), payload)
  }
}

impl Default for Trigger {
  fn default() -> Self {
    Self::manual(Value::Null)
  }
}

fn default_trigger_kind() -> String {
  "manual".to_string()
}

/// Per-execution context handed to every node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowContext {
  /// Assigned by the engine when absent.
  #[serde(default)]
  pub execution_id: Option<String>,
  pub tenant_id: String,
  #[serde(default)]
  pub user_id: Option<String>,
  #[serde(default)]
  pub trigger: Trigger,
  #[serde(default)]
  pub variables: Variables,
}

impl WorkflowContext {
  pub fn new(tenant_id: impl Into<String>) -> Self {
    Self {
      tenant_id: tenant_id.into(),
      ..Self::default()
    }
  }

  pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
    self.execution_id = Some(execution_id.into());
    self
  }

  pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
    self.user_id = Some(user_id.into());
    self
  }

  pub fn with_trigger(mut self, trigger: Trigger) -> Self {
    self.trigger = trigger;
    self
  }

  pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
    self.variables = Variables::from(variables);
    self
  }

  /// The `context` root seen by templates.
  pub fn template_view(&self) -> Value {
    json!({
      "execution_id": self.execution_id,
      "tenant_id": self.tenant_id,
      "user_id": self.user_id,
      "trigger": {
        "kind": self.trigger.kind,
        "payload": self.trigger.payload,
        "metadata": self.trigger.metadata,
      },
      "variables": self.variables.snapshot(),
    })
  }
}
