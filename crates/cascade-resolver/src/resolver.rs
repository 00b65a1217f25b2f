use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde_json::{Map, Value};

use crate::bindings::Bindings;
use crate::error::ResolveError;
use crate::path;
use crate::template::{self, Segment};

/// Resolves `{{ expr }}` placeholders inside JSON values.
///
/// Holds a strict-undefined minijinja environment so it can be built once
/// and reused across nodes.
#[derive(Debug)]
pub struct Resolver {
  env: Environment<'static>,
}

impl Resolver {
  pub fn new() -> Self {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    Self { env }
  }

  /// Resolve every placeholder in `template`.
  ///
  /// Strings are scanned, arrays and object values are resolved recursively,
  /// object keys and other scalars are returned as-is.
  pub fn resolve(&self, template: &Value, bindings: &Bindings) -> Result<Value, ResolveError> {
    match template {
      Value::String(text) => self.resolve_str(text, bindings),
      Value::Array(items) => items
        .iter()
        .map(|item| self.resolve(item, bindings))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array),
      Value::Object(map) => map
        .iter()
        .map(|(key, value)| Ok((key.clone(), self.resolve(value, bindings)?)))
        .collect::<Result<Map<_, _>, _>>()
        .map(Value::Object),
      other => Ok(other.clone()),
    }
  }

  fn resolve_str(&self, text: &str, bindings: &Bindings) -> Result<Value, ResolveError> {
    if !template::contains_placeholder(text) {
      return Ok(Value::String(text.to_string()));
    }

    let segments = template::parse(text)?;

    // A lone placeholder keeps the native type of the referenced value.
    if let Some(expr) = template::single_expression(&segments) {
      return self.evaluate(expr, bindings);
    }

    let mut out = String::with_capacity(text.len());
    for segment in &segments {
      match segment {
        Segment::Literal(literal) => out.push_str(literal),
        Segment::Expr(expr) => out.push_str(&stringify(&self.evaluate(expr, bindings)?)),
      }
    }
    Ok(Value::String(out))
  }

  /// Evaluate a single expression to a JSON value.
  pub fn evaluate(&self, expr: &str, bindings: &Bindings) -> Result<Value, ResolveError> {
    if let Some((root, segments)) = path::parse(expr)
      && let Some(base) = bindings.root(&root)
    {
      return path::walk(base, &segments)
        .cloned()
        .ok_or_else(|| missing(expr));
    }

    let compiled = self
      .env
      .compile_expression(expr)
      .map_err(|e| expression_error(expr, &e))?;

    let value = compiled
      .eval(bindings.template_context())
      .map_err(|e| match e.kind() {
        ErrorKind::UndefinedError => missing(expr),
        _ => expression_error(expr, &e),
      })?;

    if value.is_undefined() {
      return Err(missing(expr));
    }

    serde_json::to_value(&value).map_err(|e| ResolveError::Expression {
      expression: expr.to_string(),
      message: e.to_string(),
    })
  }
}

impl Default for Resolver {
  fn default() -> Self {
    Self::new()
  }
}

/// Resolve `template` with a one-off [`Resolver`].
pub fn resolve(template: &Value, bindings: &Bindings) -> Result<Value, ResolveError> {
  Resolver::new().resolve(template, bindings)
}

fn stringify(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn missing(expr: &str) -> ResolveError {
  ResolveError::MissingPath {
    path: expr.to_string(),
  }
}

fn expression_error(expr: &str, err: &minijinja::Error) -> ResolveError {
  let message = match err.detail() {
    Some(detail) => format!("{}: {detail}", err.kind()),
    None => err.kind().to_string(),
  };
  ResolveError::Expression {
    expression: expr.to_string(),
    message,
  }
}
