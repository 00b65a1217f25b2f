use thiserror::Error;

/// Errors raised while resolving `{{ }}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  /// A referenced path does not exist in the bindings.
  #[error("missing value at path '{path}'")]
  MissingPath { path: String },

  /// `{{` without a closing `}}`.
  #[error("unterminated placeholder in '{template}'")]
  Unterminated { template: String },

  #[error("empty placeholder in '{template}'")]
  EmptyExpression { template: String },

  /// The expression failed to compile or evaluate.
  #[error("failed to evaluate '{expression}': {message}")]
  Expression { expression: String, message: String },
}
