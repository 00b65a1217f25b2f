//! The `utils` object exposed to expressions.
//!
//! A fixed set of helper methods. Nothing here touches the host beyond the
//! clock and the random source used by `uuid()`.

use std::sync::Arc;

use minijinja::value::{Object, Value};
use minijinja::{Error, ErrorKind, State};

#[derive(Debug)]
pub(crate) struct Utils;

impl Object for Utils {
  fn call_method(
    self: &Arc<Self>,
    _state: &State<'_, '_>,
    method: &str,
    args: &[Value],
  ) -> Result<Value, Error> {
    match method {
      "uuid" => Ok(Value::from(uuid::Uuid::new_v4().to_string())),
      "now" => Ok(Value::from(chrono::Utc::now().to_rfc3339())),
      "timestamp" => Ok(Value::from(chrono::Utc::now().timestamp_millis())),
      "upper" => Ok(Value::from(text(arg(args, 0, method)?).to_uppercase())),
      "lower" => Ok(Value::from(text(arg(args, 0, method)?).to_lowercase())),
      "trim" => Ok(Value::from(text(arg(args, 0, method)?).trim().to_string())),
      "length" => {
        let value = arg(args, 0, method)?;
        let len = value.len().ok_or_else(|| {
          Error::new(
            ErrorKind::InvalidOperation,
            format!("utils.length: value of type {} has no length", value.kind()),
          )
        })?;
        Ok(Value::from(len))
      }
      "join" => {
        let sep = args.get(1).map(text).unwrap_or_default();
        let parts: Vec<String> = arg(args, 0, method)?.try_iter()?.map(|v| text(&v)).collect();
        Ok(Value::from(parts.join(&sep)))
      }
      "split" => {
        let value = text(arg(args, 0, method)?);
        let sep = text(arg(args, 1, method)?);
        let parts: Vec<Value> = value.split(sep.as_str()).map(Value::from).collect();
        Ok(Value::from(parts))
      }
      "first" => Ok(arg(args, 0, method)?.try_iter()?.next().unwrap_or_else(none)),
      "last" => Ok(arg(args, 0, method)?.try_iter()?.last().unwrap_or_else(none)),
      "coalesce" => Ok(
        args
          .iter()
          .find(|v| !v.is_undefined() && !v.is_none())
          .cloned()
          .unwrap_or_else(none),
      ),
      "to_json" => {
        let value = arg(args, 0, method)?;
        serde_json::to_string(value)
          .map(Value::from)
          .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("utils.to_json: {e}")))
      }
      "parse_json" => {
        let source = text(arg(args, 0, method)?);
        let parsed: serde_json::Value = serde_json::from_str(&source)
          .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("utils.parse_json: {e}")))?;
        Ok(Value::from_serialize(&parsed))
      }
      _ => Err(Error::new(
        ErrorKind::UnknownMethod,
        format!("utils has no method named {method}"),
      )),
    }
  }
}

fn arg<'a>(args: &'a [Value], index: usize, method: &str) -> Result<&'a Value, Error> {
  args.get(index).ok_or_else(|| {
    Error::new(
      ErrorKind::MissingArgument,
      format!("utils.{method} expects argument {}", index + 1),
    )
  })
}

fn none() -> Value {
  Value::from(())
}

/// String form of a value. Strings are used verbatim, `none` becomes empty.
fn text(value: &Value) -> String {
  if let Some(s) = value.as_str() {
    s.to_string()
  } else if value.is_none() || value.is_undefined() {
    String::new()
  } else {
    value.to_string()
  }
}
