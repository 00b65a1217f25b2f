use cascade_workflow::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of checking a node's configuration before execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
  pub valid: bool,
  #[serde(default)]
  pub errors: Vec<String>,
  #[serde(default)]
  pub warnings: Vec<String>,
}

impl ValidationResult {
  pub fn ok() -> Self {
    Self {
      valid: true,
      errors: Vec::new(),
      warnings: Vec::new(),
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    let mut result = Self::ok();
    result.push_error(message);
    result
  }

  pub fn push_error(&mut self, message: impl Into<String>) {
    self.valid = false;
    self.errors.push(message.into());
  }

  pub fn push_warning(&mut self, message: impl Into<String>) {
    self.warnings.push(message.into());
  }

  pub fn merge(mut self, other: ValidationResult) -> Self {
    self.valid &= other.valid;
    self.errors.extend(other.errors);
    self.warnings.extend(other.warnings);
    self
  }
}

impl Default for ValidationResult {
  fn default() -> Self {
    Self::ok()
  }
}

/// Report every required parameter that is missing, null, or an empty string.
pub fn validate_required<I, S>(node: &Node, required: I) -> ValidationResult
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut result = ValidationResult::ok();
  for name in required {
    let name = name.as_ref();
    let present = match node.parameter(name) {
      None | Some(Value::Null) => false,
      Some(Value::String(s)) => !s.trim().is_empty(),
      Some(_) => true,
    };
    if !present {
      result.push_error(format!("missing required parameter '{name}'"));
    }
  }
  result
}
