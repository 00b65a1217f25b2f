use std::sync::OnceLock;

use minijinja::context;
use serde_json::Value;

use crate::utils::Utils;

/// Data visible to `{{ }}` expressions.
///
/// | Root | Content |
/// |------|---------|
/// | `context` | execution id, tenant, user, trigger, variables |
/// | `nodes` / `state` | node_id -> serialized node result |
/// | `json` | trigger payload |
/// | `utils` | helper methods, expressions only |
#[derive(Debug, Default)]
pub struct Bindings {
  context: Value,
  nodes: Value,
  json: Value,
  template_context: OnceLock<minijinja::Value>,
}

impl Bindings {
  pub fn new(context: Value, nodes: Value, json: Value) -> Self {
    Self {
      context,
      nodes,
      json,
      template_context: OnceLock::new(),
    }
  }

  /// Root value for plain path lookups. `utils` is not a data root.
  pub(crate) fn root(&self, name: &str) -> Option<&Value> {
    match name {
      "context" => Some(&self.context),
      "nodes" | "state" => Some(&self.nodes),
      "json" => Some(&self.json),
      _ => None,
    }
  }

  /// Evaluation context for the expression engine, built on first use.
  pub(crate) fn template_context(&self) -> minijinja::Value {
    self
      .template_context
      .get_or_init(|| {
        let nodes = minijinja::Value::from_serialize(&self.nodes);
        context! {
          context => minijinja::Value::from_serialize(&self.context),
          nodes => nodes.clone(),
          state => nodes,
          json => minijinja::Value::from_serialize(&self.json),
          utils => minijinja::Value::from_object(Utils),
        }
      })
      .clone()
  }
}

impl Clone for Bindings {
  fn clone(&self) -> Self {
    Self::new(self.context.clone(), self.nodes.clone(), self.json.clone())
  }
}
