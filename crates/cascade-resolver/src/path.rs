//! Plain path expressions such as `nodes.fetch-user.output.items[0]["first name"]`.
//!
//! Paths are walked directly over the bindings instead of going through the
//! expression engine, so node ids containing hyphens work with dot access.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathSegment {
  Key(String),
  Index(usize),
}

/// Parse `expr` as a plain path. Returns `None` for anything else
/// (filters, calls, operators, literals), which is left to the expression engine.
pub(crate) fn parse(expr: &str) -> Option<(String, Vec<PathSegment>)> {
  let bytes = expr.as_bytes();
  let mut pos = 0;

  let root = take_while(expr, &mut pos, |c| c.is_ascii_alphanumeric() || c == b'_');
  if root.is_empty() || root.as_bytes()[0].is_ascii_digit() {
    return None;
  }

  let mut segments = Vec::new();
  while pos < bytes.len() {
    match bytes[pos] {
      b'.' => {
        pos += 1;
        let key = take_while(expr, &mut pos, |c| {
          c.is_ascii_alphanumeric() || c == b'_' || c == b'-'
        });
        if key.is_empty() {
          return None;
        }
        segments.push(PathSegment::Key(key.to_string()));
      }
      b'[' => {
        pos += 1;
        let segment = match bytes.get(pos)? {
          quote @ (b'"' | b'\'') => {
            let quote = *quote;
            pos += 1;
            let key = take_while(expr, &mut pos, |c| c != quote);
            if bytes.get(pos) != Some(&quote) {
              return None;
            }
            pos += 1;
            PathSegment::Key(key.to_string())
          }
          _ => {
            let digits = take_while(expr, &mut pos, |c| c.is_ascii_digit());
            PathSegment::Index(digits.parse().ok()?)
          }
        };
        if bytes.get(pos) != Some(&b']') {
          return None;
        }
        pos += 1;
        segments.push(segment);
      }
      _ => return None,
    }
  }

  Some((root.to_string(), segments))
}

fn take_while<'a>(text: &'a str, pos: &mut usize, pred: impl Fn(u8) -> bool) -> &'a str {
  let start = *pos;
  let bytes = text.as_bytes();
  while *pos < bytes.len() && pred(bytes[*pos]) {
    *pos += 1;
  }
  &text[start..*pos]
}

/// Follow `segments` starting at `value`.
///
/// A `Key` segment that is all digits also indexes into arrays, so
/// `items.0` and `items[0]` are equivalent.
pub(crate) fn walk<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
  segments
    .iter()
    .try_fold(value, |current, segment| match (segment, current) {
      (PathSegment::Key(key), Value::Object(map)) => map.get(key),
      (PathSegment::Key(key), Value::Array(items)) => items.get(key.parse::<usize>().ok()?),
      (PathSegment::Index(i), Value::Array(items)) => items.get(*i),
      _ => None,
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_dotted_and_bracketed() {
    let (root, segments) = parse(r#"nodes.fetch-user.output.items[1]["first name"]"#).unwrap();
    assert_eq!(root, "nodes");
    assert_eq!(
      segments,
      vec![
        PathSegment::Key("fetch-user".into()),
        PathSegment::Key("output".into()),
        PathSegment::Key("items".into()),
        PathSegment::Index(1),
        PathSegment::Key("first name".into()),
      ]
    );
  }

  #[test]
  fn test_non_paths_are_rejected() {
    assert_eq!(parse("name | upper"), None);
    assert_eq!(parse("utils.uuid()"), None);
    assert_eq!(parse("a == 1"), None);
    assert_eq!(parse("'literal'"), None);
    assert_eq!(parse("1"), None);
    assert_eq!(parse("a."), None);
    assert_eq!(parse("a[x]"), None);
  }

  #[test]
  fn test_walk() {
    let value = json!({ "a": { "items": [10, { "b": true }] } });
    let (_, segments) = parse("root.a.items[1].b").unwrap();
    assert_eq!(walk(&value, &segments), Some(&json!(true)));

    let (_, segments) = parse("root.a.items.0").unwrap();
    assert_eq!(walk(&value, &segments), Some(&json!(10)));

    let (_, segments) = parse("root.a.missing").unwrap();
    assert_eq!(walk(&value, &segments), None);
  }
}
