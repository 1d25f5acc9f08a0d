// SPDX-License-Identifier: MIT

//! Entry points for the three ways a form uses an expression: deciding
//! visibility, validating a value, and computing a calculated field.
//!
//! Visibility and validation fail open. A broken expression must never hide
//! a field or block a submission.

use serde::{Serialize, Serializer};

use super::arithmetic::is_arithmetic_expression;
use super::evaluator::{strip_template, ExpressionEvaluator};
use super::value::{to_boolean, ExpressionValue};

/// Result of a validation expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid,
    /// The expression produced an error message to show next to the field
    Message(String),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Message(message) => Some(message),
            _ => None,
        }
    }
}

impl From<bool> for ValidationOutcome {
    fn from(valid: bool) -> Self {
        if valid {
            ValidationOutcome::Valid
        } else {
            ValidationOutcome::Invalid
        }
    }
}

/// `true`, `false` or the message string
impl Serialize for ValidationOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValidationOutcome::Valid => serializer.serialize_bool(true),
            ValidationOutcome::Invalid => serializer.serialize_bool(false),
            ValidationOutcome::Message(message) => serializer.serialize_str(message),
        }
    }
}

/// Drop a leading `return ` and a trailing `;`
pub fn strip_statement(expression: &str) -> &str {
    let expr = expression.trim();
    let expr = expr.strip_prefix("return ").map_or(expr, str::trim);
    expr.strip_suffix(';').map_or(expr, str::trim)
}

impl ExpressionEvaluator {
    /// Whether a field is visible. Empty or failing expressions keep it visible.
    pub fn evaluate_visibility(&self, expression: &str) -> bool {
        let expr = strip_statement(expression);
        if expr.is_empty() {
            return true;
        }
        match self.try_evaluate(expr) {
            Ok(value) => to_boolean(value.as_ref()),
            Err(err) => {
                log::warn!("Failed to evaluate visibility '{}': {}", expression, err);
                true
            }
        }
    }

    /// Validate the current value. A non-empty string result is an error
    /// message; anything else is read as a boolean.
    pub fn evaluate_validation(&self, expression: &str) -> ValidationOutcome {
        let expr = strip_statement(expression);
        if expr.is_empty() {
            return ValidationOutcome::Valid;
        }
        match self.try_evaluate(expr) {
            Ok(Some(ExpressionValue::String(message))) if !message.is_empty() => {
                ValidationOutcome::Message(message)
            }
            Ok(value) => ValidationOutcome::from(to_boolean(value.as_ref())),
            Err(err) => {
                log::warn!("Failed to evaluate validation '{}': {}", expression, err);
                ValidationOutcome::Valid
            }
        }
    }

    /// Compute a calculated field.
    ///
    /// Grid aggregates are tried first, then pure arithmetic, then the full
    /// grammar. Null and unresolved results become `0`. `None` only for an
    /// empty expression.
    pub fn evaluate_calculation(&self, expression: &str) -> Option<ExpressionValue> {
        if expression.trim().is_empty() {
            return None;
        }
        let expr = strip_template(strip_statement(expression));

        if let Some(total) = self.evaluate_grid_function(expr) {
            return Some(ExpressionValue::Number(total));
        }

        if is_arithmetic_expression(expr) {
            return Some(ExpressionValue::Number(self.evaluate_arithmetic(expr)));
        }

        match self.try_evaluate(expr) {
            Ok(None) | Ok(Some(ExpressionValue::Null)) => Some(ExpressionValue::Number(0.0)),
            Ok(value) => value,
            Err(err) => {
                log::warn!("Failed to evaluate calculation '{}': {}", expression, err);
                Some(ExpressionValue::Number(0.0))
            }
        }
    }
}
