use serde::{Deserialize, Serialize};

/// A directed dependency between two nodes.
///
/// A labeled edge is only followed when the source node selects a matching
/// branch (e.g. `"true"`/`"false"` for condition nodes, `"error"` for error routing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDef {
  #[serde(alias = "source")]
  pub from: String,
  #[serde(alias = "target")]
  pub to: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
}

impl EdgeDef {
  pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
      label: None,
    }
  }

  pub fn labeled(from: impl Into<String>, to: impl Into<String>, label: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
      label: Some(label.into()),
    }
  }
}
