// SPDX-License-Identifier: MIT

//! Typed error handling for form-expr
//!
//! Evaluation never surfaces these to form rendering: the public entry points
//! on [`crate::ExpressionEvaluator`] log them and fall back to a mode default.
//! They are exposed through `try_evaluate` and the context loader.

use thiserror::Error;

/// Failures raised while evaluating a single expression
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    /// Structurally broken input (unbalanced brackets, unterminated string)
    #[error("Malformed expression '{expression}': {reason}")]
    Malformed { expression: String, reason: String },

    /// Nesting went deeper than the configured limit
    #[error("Expression nesting exceeds max depth of {limit}")]
    DepthExceeded { limit: usize },
}

/// Failures raised while loading an evaluation context snapshot
#[derive(Debug, Error)]
pub enum ContextError {
    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// File extension is neither YAML nor JSON
    #[error("Unsupported context format: {0}")]
    UnsupportedFormat(String),
}

impl EvalError {
    /// Create a malformed-expression error
    pub fn malformed(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Create a depth-exceeded error
    pub fn depth_exceeded(limit: usize) -> Self {
        Self::DepthExceeded { limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let err = EvalError::malformed("a == (b", "unclosed '('");
        assert_eq!(
            err.to_string(),
            "Malformed expression 'a == (b': unclosed '('"
        );
    }

    #[test]
    fn test_depth_display() {
        assert_eq!(
            EvalError::depth_exceeded(64).to_string(),
            "Expression nesting exceeds max depth of 64"
        );
    }

    #[test]
    fn test_context_error_from_json() {
        let err: ContextError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ContextError::Json(_)));
    }
}
