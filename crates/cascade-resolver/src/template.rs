//! Splitting template strings into literal text and `{{ }}` expressions.

use crate::error::ResolveError;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
  Literal(&'a str),
  /// Trimmed expression text between the delimiters.
  Expr(&'a str),
}

/// Split a string into literal and expression segments.
pub(crate) fn parse(template: &str) -> Result<Vec<Segment<'_>>, ResolveError> {
  let mut segments = Vec::new();
  let mut rest = template;

  while let Some(start) = rest.find(OPEN) {
    if start > 0 {
      segments.push(Segment::Literal(&rest[..start]));
    }
    let after_open = &rest[start + OPEN.len()..];
    let Some(end) = after_open.find(CLOSE) else {
      return Err(ResolveError::Unterminated {
        template: template.to_string(),
      });
    };

    let expr = after_open[..end].trim();
    if expr.is_empty() {
      return Err(ResolveError::EmptyExpression {
        template: template.to_string(),
      });
    }
    segments.push(Segment::Expr(expr));
    rest = &after_open[end + CLOSE.len()..];
  }

  if !rest.is_empty() {
    segments.push(Segment::Literal(rest));
  }

  Ok(segments)
}

/// The expression of a template that is exactly one placeholder.
///
/// Any surrounding text, whitespace included, makes it an embedded one.
pub(crate) fn single_expression<'a>(segments: &[Segment<'a>]) -> Option<&'a str> {
  match segments {
    [Segment::Expr(expr)] => Some(*expr),
    _ => None,
  }
}

pub(crate) fn contains_placeholder(text: &str) -> bool {
  text.contains(OPEN)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_mixed_segments() {
    let segments = parse("Hello {{ name }}, you are {{age}}!").unwrap();
    assert_eq!(
      segments,
      vec![
        Segment::Literal("Hello "),
        Segment::Expr("name"),
        Segment::Literal(", you are "),
        Segment::Expr("age"),
        Segment::Literal("!"),
      ]
    );
    assert_eq!(single_expression(&segments), None);
  }

  #[test]
  fn test_single_expression_is_exact() {
    let segments = parse("{{  nodes.a.output }}").unwrap();
    assert_eq!(single_expression(&segments), Some("nodes.a.output"));

    let padded = parse("  {{ nodes.a.output }} ").unwrap();
    assert_eq!(single_expression(&padded), None);
    assert_eq!(single_expression(&parse(" {{ n }}").unwrap()), None);
  }

  #[test]
  fn test_unterminated_and_empty() {
    assert!(matches!(
      parse("value {{ oops"),
      Err(ResolveError::Unterminated { .. })
    ));
    assert!(matches!(
      parse("{{   }}"),
      Err(ResolveError::EmptyExpression { .. })
    ));
  }

  #[test]
  fn test_plain_text_is_one_literal() {
    assert_eq!(parse("no braces").unwrap(), vec![Segment::Literal("no braces")]);
    assert_eq!(parse("").unwrap(), vec![]);
  }
}
