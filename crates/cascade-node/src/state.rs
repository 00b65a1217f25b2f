use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::result::{NodeResult, NodeStatus};

/// Results of the nodes that have finished so far, keyed by node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionState {
  results: BTreeMap<String, NodeResult>,
}

impl ExecutionState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a node result, replacing an earlier attempt of the same node.
  pub fn insert(&mut self, node_id: impl Into<String>, result: NodeResult) -> Option<NodeResult> {
    self.results.insert(node_id.into(), result)
  }

  pub fn get(&self, node_id: &str) -> Option<&NodeResult> {
    self.results.get(node_id)
  }

  pub fn contains(&self, node_id: &str) -> bool {
    self.results.contains_key(node_id)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeResult)> {
    self.results.iter().map(|(id, r)| (id.as_str(), r))
  }

  pub fn len(&self) -> usize {
    self.results.len()
  }

  pub fn is_empty(&self) -> bool {
    self.results.is_empty()
  }

  pub fn count(&self, status: NodeStatus) -> usize {
    self.results.values().filter(|r| r.status == status).count()
  }

  pub fn has_errors(&self) -> bool {
    self.results.values().any(NodeResult::is_error)
  }

  /// Ids of nodes whose final status is `error`.
  pub fn failed_nodes(&self) -> impl Iterator<Item = &str> {
    self
      .results
      .iter()
      .filter(|(_, r)| r.is_error())
      .map(|(id, _)| id.as_str())
  }

  /// The `nodes` / `state` root seen by templates.
  pub fn template_view(&self) -> Value {
    let map: Map<String, Value> = self
      .results
      .iter()
      .map(|(id, result)| (id.clone(), result_value(result)))
      .collect();
    Value::Object(map)
  }
}

/// NodeResult only holds JSON-compatible data, so serialization can't fail.
fn result_value(result: &NodeResult) -> Value {
  serde_json::to_value(result).unwrap_or_default()
}
