// SPDX-License-Identifier: MIT

//! Expression evaluator
//!
//! Expressions are never compiled into a tree. Each level of the grammar tries
//! to match its structure against the raw text and otherwise hands the text to
//! the next level, lowest precedence first:
//!
//! ternary, `??`, `||`, `&&`, `!`, `( )`, comparison, `in [..]`,
//! `.contains(..)`, function call, literal / variable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::splitter::{check_balanced, enclosing_group, split_array_items, split_by_operator, split_ternary};
use super::value::{
    format_number, loose_equals, parse_float, strict_equals, to_boolean, to_number, ExpressionValue,
};
use crate::context::{ContextPatch, ExtendedContextPatch, ExtendedEvaluationContext};
use crate::error::EvalError;

/// Result of resolving or evaluating something; `None` is "undefined"
pub type Resolved = Option<ExpressionValue>;

/// Outcome of evaluating a sub-expression
pub type EvalResult = Result<Resolved, EvalError>;

static MEMBERSHIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+in\s+\[(.+)\]$").expect("membership pattern is valid"));

static CONTAINS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\.contains\((.+)\)$").expect("contains pattern is valid"));

/// Comparison operators, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    StrictEq,
    StrictNotEq,
    Eq,
    NotEq,
    Gte,
    Lte,
    Gt,
    Lt,
}

impl CompareOp {
    /// Longer operators come first so `===` is never read as `==`
    pub const ALL: [CompareOp; 8] = [
        CompareOp::StrictEq,
        CompareOp::StrictNotEq,
        CompareOp::Eq,
        CompareOp::NotEq,
        CompareOp::Gte,
        CompareOp::Lte,
        CompareOp::Gt,
        CompareOp::Lt,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::StrictEq => "===",
            CompareOp::StrictNotEq => "!==",
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        }
    }

    pub fn apply(self, left: Option<&ExpressionValue>, right: Option<&ExpressionValue>) -> bool {
        match self {
            CompareOp::StrictEq => strict_equals(left, right),
            CompareOp::StrictNotEq => !strict_equals(left, right),
            CompareOp::Eq => loose_equals(left, right),
            CompareOp::NotEq => !loose_equals(left, right),
            CompareOp::Gte => to_number(left) >= to_number(right),
            CompareOp::Lte => to_number(left) <= to_number(right),
            CompareOp::Gt => to_number(left) > to_number(right),
            CompareOp::Lt => to_number(left) < to_number(right),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Tuning knobs for an evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct EvaluatorOptions {
    /// Deepest nesting accepted before evaluation gives up
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    64
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Evaluates expressions against one bound context snapshot
#[derive(Debug, Clone, Default)]
pub struct ExpressionEvaluator {
    context: ExtendedEvaluationContext,
    options: EvaluatorOptions,
}

/// Remove an optional `${ ... }` wrapper
pub fn strip_template(expression: &str) -> &str {
    let expr = expression.trim();
    match expr.strip_prefix("${").and_then(|e| e.strip_suffix('}')) {
        Some(inner) => inner.trim(),
        None => expr,
    }
}

fn is_quoted(expr: &str) -> bool {
    expr.len() >= 2
        && ((expr.starts_with('"') && expr.ends_with('"'))
            || (expr.starts_with('\'') && expr.ends_with('\'')))
}

impl ExpressionEvaluator {
    pub fn new(context: impl Into<ExtendedEvaluationContext>) -> Self {
        Self::with_options(context, EvaluatorOptions::default())
    }

    pub fn with_options(
        context: impl Into<ExtendedEvaluationContext>,
        options: EvaluatorOptions,
    ) -> Self {
        Self {
            context: context.into(),
            options,
        }
    }

    pub fn context(&self) -> &ExtendedEvaluationContext {
        &self.context
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    /// Replace the form / process / user entries present in `patch`
    pub fn update_context(&mut self, patch: ContextPatch) {
        self.context.base.apply(patch);
    }

    /// Replace any top-level entries present in `patch`, grids and task included
    pub fn update_extended_context(&mut self, patch: ExtendedContextPatch) {
        self.context.apply(patch);
    }

    /// Evaluate an expression, reporting failures instead of hiding them.
    ///
    /// `Ok(None)` means the expression resolved to nothing (unknown variable,
    /// empty input).
    pub fn try_evaluate(&self, expression: &str) -> EvalResult {
        let expr = strip_template(expression);
        if expr.is_empty() {
            return Ok(None);
        }
        check_balanced(expr)?;
        self.eval_expr(expr, 0)
    }

    /// Evaluate an expression to a scalar.
    ///
    /// Lists and maps, unresolved variables and any failure come back as `Null`.
    pub fn evaluate(&self, expression: &str) -> ExpressionValue {
        if expression.trim().is_empty() {
            return ExpressionValue::Null;
        }
        match self.try_evaluate(expression) {
            Ok(value) => ExpressionValue::from_resolved(value).narrow(),
            Err(err) => {
                log::warn!("Failed to evaluate expression '{}': {}", expression, err);
                ExpressionValue::Null
            }
        }
    }

    /// Evaluate and coerce the result to a boolean
    pub fn evaluate_boolean(&self, expression: &str) -> bool {
        if expression.trim().is_empty() {
            return false;
        }
        match self.try_evaluate(expression) {
            Ok(value) => to_boolean(value.as_ref()),
            Err(err) => {
                log::warn!("Failed to evaluate expression '{}': {}", expression, err);
                false
            }
        }
    }

    pub(crate) fn eval_expr(&self, expr: &str, depth: usize) -> EvalResult {
        if depth > self.options.max_depth {
            return Err(EvalError::depth_exceeded(self.options.max_depth));
        }
        let expr = expr.trim();
        let next = depth + 1;

        if let Some(parts) = split_ternary(expr) {
            let condition = self.eval_expr(parts.condition, next)?;
            let branch = if to_boolean(condition.as_ref()) {
                parts.when_true
            } else {
                parts.when_false
            };
            return self.eval_expr(branch, next);
        }

        if let [primary, fallback] = split_by_operator(expr, "??").as_slice() {
            return match self.eval_expr(primary, next)? {
                None | Some(ExpressionValue::Null) => self.eval_expr(fallback, next),
                value => Ok(value),
            };
        }

        let branches = split_by_operator(expr, "||");
        if branches.len() > 1 {
            for branch in branches {
                if to_boolean(self.eval_expr(branch, next)?.as_ref()) {
                    return Ok(Some(ExpressionValue::Bool(true)));
                }
            }
            return Ok(Some(ExpressionValue::Bool(false)));
        }

        let branches = split_by_operator(expr, "&&");
        if branches.len() > 1 {
            for branch in branches {
                if !to_boolean(self.eval_expr(branch, next)?.as_ref()) {
                    return Ok(Some(ExpressionValue::Bool(false)));
                }
            }
            return Ok(Some(ExpressionValue::Bool(true)));
        }

        if expr.starts_with('!') && !expr.starts_with("!=") {
            let inner = expr[1..].trim();
            let target = enclosing_group(inner).unwrap_or(inner);
            let value = self.eval_expr(target, next)?;
            return Ok(Some(ExpressionValue::Bool(!to_boolean(value.as_ref()))));
        }

        if let Some(inner) = enclosing_group(expr) {
            return self.eval_expr(inner, next);
        }

        if let Some(result) = self.eval_comparison(expr, next)? {
            return Ok(Some(ExpressionValue::Bool(result)));
        }

        if let Some(caps) = MEMBERSHIP.captures(expr) {
            let value = self.eval_expr(caps[1].trim(), next)?;
            let items = self.parse_array(&caps[2], next)?;
            let found = items
                .iter()
                .any(|item| loose_equals(value.as_ref(), Some(item)));
            return Ok(Some(ExpressionValue::Bool(found)));
        }

        if let Some(caps) = CONTAINS.captures(expr) {
            let collection = self.resolve_value(caps[1].trim(), next)?;
            let needle = self.eval_expr(caps[2].trim(), next)?;
            let found = match collection {
                Some(ExpressionValue::List(items)) => items
                    .iter()
                    .any(|item| loose_equals(Some(item), needle.as_ref())),
                _ => false,
            };
            return Ok(Some(ExpressionValue::Bool(found)));
        }

        if let Some(result) = self.eval_function_call(expr, next)? {
            return Ok(result);
        }

        self.resolve_value(expr, next)
    }

    /// The first operator whose split gives exactly two sides wins.
    /// `a < b < c` splits three ways on `<` and matches nothing.
    fn eval_comparison(&self, expr: &str, depth: usize) -> Result<Option<bool>, EvalError> {
        for op in CompareOp::ALL {
            if let [left, right] = split_by_operator(expr, op.symbol()).as_slice() {
                let left = self.eval_operand(left.trim(), depth)?;
                let right = self.eval_operand(right.trim(), depth)?;
                return Ok(Some(op.apply(left.as_ref(), right.as_ref())));
            }
        }
        Ok(None)
    }

    /// A comparison side: a function call when shaped like one, otherwise a
    /// literal or variable
    fn eval_operand(&self, expr: &str, depth: usize) -> EvalResult {
        match self.eval_function_call(expr, depth)? {
            Some(result) => Ok(result),
            None => self.resolve_value(expr, depth),
        }
    }

    /// Literal detection, falling back to a variable path
    pub(crate) fn resolve_value(&self, expr: &str, depth: usize) -> EvalResult {
        if depth > self.options.max_depth {
            return Err(EvalError::depth_exceeded(self.options.max_depth));
        }
        let expr = expr.trim();

        if is_quoted(expr) {
            return Ok(Some(ExpressionValue::String(expr[1..expr.len() - 1].to_string())));
        }

        if let Some(n) = parse_float(expr) {
            if format_number(n) == expr {
                return Ok(Some(ExpressionValue::Number(n)));
            }
        }

        match expr {
            "true" => return Ok(Some(ExpressionValue::Bool(true))),
            "false" => return Ok(Some(ExpressionValue::Bool(false))),
            "null" => return Ok(Some(ExpressionValue::Null)),
            _ => {}
        }

        if let Some(body) = expr.strip_prefix('[').and_then(|e| e.strip_suffix(']')) {
            return Ok(Some(ExpressionValue::List(self.parse_array(body, depth + 1)?)));
        }

        Ok(self.resolve_variable(expr))
    }

    /// Items of an array literal body; unresolved items become `Null`
    fn parse_array(&self, body: &str, depth: usize) -> Result<Vec<ExpressionValue>, EvalError> {
        split_array_items(body)
            .into_iter()
            .map(|item| {
                self.resolve_value(item, depth)
                    .map(ExpressionValue::from_resolved)
            })
            .collect()
    }

    pub(crate) fn resolve_variable(&self, path: &str) -> Resolved {
        self.context.resolve_path(path)
    }
}

/// An evaluator over the default context with `patch` applied
pub fn create_evaluator(patch: ContextPatch) -> ExpressionEvaluator {
    let mut context = crate::context::create_default_context();
    context.apply(patch);
    ExpressionEvaluator::new(context)
}

/// An evaluator over an extended context (grids, task, value) built from `patch`
pub fn create_safe_evaluator(patch: ExtendedContextPatch) -> ExpressionEvaluator {
    let mut context = ExtendedEvaluationContext::default();
    context.apply(patch);
    ExpressionEvaluator::new(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evaluator() -> ExpressionEvaluator {
        let patch: ContextPatch = serde_json::from_value(json!({
            "form": {
                "amount": 1000,
                "status": "pending",
                "category": "travel",
                "items": ["flight", "hotel"],
                "nullField": null,
                "zero": 0,
                "falseField": false,
                "name": "Alice"
            },
            "process": {"initiator": "user1", "priority": "high", "amount": 999},
            "user": {
                "id": "user1",
                "username": "user1",
                "roles": ["user", "admin"],
                "groups": ["engineering"]
            }
        }))
        .unwrap();
        create_evaluator(patch)
    }

    fn num(n: f64) -> ExpressionValue {
        ExpressionValue::Number(n)
    }

    fn text(s: &str) -> ExpressionValue {
        ExpressionValue::from(s)
    }

    #[test]
    fn test_literals() {
        let ev = evaluator();
        assert_eq!(ev.evaluate("true"), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate("false"), ExpressionValue::Bool(false));
        assert_eq!(ev.evaluate("123"), num(123.0));
        assert_eq!(ev.evaluate("12.34"), num(12.34));
        assert_eq!(ev.evaluate("-5"), num(-5.0));
        assert_eq!(ev.evaluate(r#""hi""#), text("hi"));
        assert_eq!(ev.evaluate("'world'"), text("world"));
        assert_eq!(ev.evaluate("null"), ExpressionValue::Null);
    }

    #[test]
    fn test_non_canonical_number_is_a_variable() {
        let ev = evaluator();
        assert_eq!(ev.try_evaluate("1.50").unwrap(), None);
    }

    #[test]
    fn test_large_integer_literal() {
        let ev = evaluator();
        assert_eq!(
            ev.evaluate("123456789012345680000"),
            ExpressionValue::Number(123456789012345680000.0)
        );
        assert_eq!(
            ev.evaluate("concat(123456789012345680000)"),
            ExpressionValue::from("123456789012345680000")
        );
    }

    #[test]
    fn test_template_wrapper_is_transparent() {
        let ev = evaluator();
        for expr in ["true", "123", "amount > 500", r#"status == "pending""#, "missing"] {
            assert_eq!(ev.evaluate(&format!("${{{}}}", expr)), ev.evaluate(expr));
        }
    }

    #[test]
    fn test_variable_resolution() {
        let ev = evaluator();
        assert_eq!(ev.evaluate("amount"), num(1000.0));
        assert_eq!(ev.evaluate("form.amount"), num(1000.0));
        assert_eq!(ev.evaluate("process.amount"), num(999.0));
        assert_eq!(ev.evaluate("initiator"), text("user1"));
        assert_eq!(ev.evaluate("user.username"), text("user1"));
        assert_eq!(ev.try_evaluate("missing").unwrap(), None);
        assert_eq!(ev.evaluate("missing"), ExpressionValue::Null);
    }

    #[test]
    fn test_compound_results_narrow_to_null() {
        let ev = evaluator();
        assert_eq!(ev.evaluate("items"), ExpressionValue::Null);
        assert_eq!(
            ev.try_evaluate("items").unwrap(),
            Some(ExpressionValue::from(json!(["flight", "hotel"])))
        );
    }

    #[test]
    fn test_comparisons() {
        let ev = evaluator();
        assert_eq!(ev.evaluate("amount == 1000"), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate("amount != 999"), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate("amount >= 1000"), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate("amount <= 999"), ExpressionValue::Bool(false));
        assert_eq!(ev.evaluate("amount < 2000"), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate(r#"amount == "1000""#), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate(r#""Y" == "y""#), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate(r#"falseField == "false""#), ExpressionValue::Bool(true));
    }

    #[test]
    fn test_strict_comparison() {
        let ev = evaluator();
        assert_eq!(ev.evaluate(r#"amount === "1000""#), ExpressionValue::Bool(false));
        assert_eq!(ev.evaluate("amount === 1000"), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate("missing === null"), ExpressionValue::Bool(false));
        assert_eq!(ev.evaluate("missing == null"), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate("nullField !== null"), ExpressionValue::Bool(false));
    }

    #[test]
    fn test_chained_comparison_is_not_special_cased() {
        let ev = evaluator();
        assert_eq!(ev.try_evaluate("1 < 2 < 3").unwrap(), None);
        assert_eq!(ev.evaluate("1 < 2 < 3"), ExpressionValue::Null);
    }

    #[test]
    fn test_function_call_as_comparison_operand() {
        let ev = evaluator();
        assert_eq!(ev.evaluate("len(name) > 3"), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate(r#"lower(name) == "alice""#), ExpressionValue::Bool(true));
    }

    #[test]
    fn test_logical_operators() {
        let ev = evaluator();
        assert_eq!(
            ev.evaluate(r#"amount > 500 && status == "pending""#),
            ExpressionValue::Bool(true)
        );
        assert_eq!(
            ev.evaluate(r#"amount > 500 && status == "approved""#),
            ExpressionValue::Bool(false)
        );
        assert_eq!(
            ev.evaluate(r#"amount > 5000 || status == "pending""#),
            ExpressionValue::Bool(true)
        );
        assert_eq!(
            ev.evaluate(r#"(amount > 500 && status == "pending") || process.priority == "low""#),
            ExpressionValue::Bool(true)
        );
        assert_eq!(
            ev.evaluate("false && undefinedVar == 1"),
            ExpressionValue::Bool(false)
        );
    }

    #[test]
    fn test_not_operator() {
        let ev = evaluator();
        assert_eq!(ev.evaluate("!falseField"), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate("!true"), ExpressionValue::Bool(false));
        assert_eq!(ev.evaluate("!(amount > 2000)"), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate("!!status"), ExpressionValue::Bool(true));
    }

    #[test]
    fn test_nullish_coalescing() {
        let ev = evaluator();
        assert_eq!(ev.evaluate(r#"missing ?? "fallback""#), text("fallback"));
        assert_eq!(ev.evaluate(r#"nullField ?? "fallback""#), text("fallback"));
        assert_eq!(ev.evaluate("zero ?? 5"), num(0.0));
    }

    #[test]
    fn test_ternary() {
        let ev = evaluator();
        assert_eq!(
            ev.evaluate(r#"amount>500 ? (amount>2000 ? "big" : "mid") : "small""#),
            text("mid")
        );
        assert_eq!(
            ev.evaluate(r#"amount > 5000 ? "big" : amount > 500 ? "mid" : "small""#),
            text("mid")
        );
        assert_eq!(
            ev.evaluate(r#"amount > 500 ? "yes" : "no""#),
            text("yes")
        );
    }

    #[test]
    fn test_membership() {
        let ev = evaluator();
        assert_eq!(
            ev.evaluate(r#"status in ["pending", "approved"]"#),
            ExpressionValue::Bool(true)
        );
        assert_eq!(
            ev.evaluate(r#"status in ["rejected", "draft"]"#),
            ExpressionValue::Bool(false)
        );
        assert_eq!(
            ev.evaluate(r#"amount in ["1000", 2000]"#),
            ExpressionValue::Bool(true)
        );
    }

    #[test]
    fn test_contains() {
        let ev = evaluator();
        assert_eq!(ev.evaluate(r#"items.contains("HOTEL")"#), ExpressionValue::Bool(true));
        assert_eq!(ev.evaluate(r#"items.contains("car")"#), ExpressionValue::Bool(false));
        assert_eq!(ev.evaluate(r#"status.contains("pen")"#), ExpressionValue::Bool(false));
    }

    #[test]
    fn test_array_literal() {
        let ev = evaluator();
        assert_eq!(
            ev.try_evaluate(r#"["a", amount, missing]"#).unwrap(),
            Some(ExpressionValue::List(vec![
                text("a"),
                num(1000.0),
                ExpressionValue::Null
            ]))
        );
    }

    #[test]
    fn test_malformed_is_an_error() {
        let ev = evaluator();
        assert!(matches!(
            ev.try_evaluate("malformed((("),
            Err(EvalError::Malformed { .. })
        ));
        assert_eq!(ev.evaluate("malformed((("), ExpressionValue::Null);
    }

    #[test]
    fn test_depth_limit() {
        let ev = ExpressionEvaluator::with_options(
            ev_context(),
            EvaluatorOptions { max_depth: 8 },
        );
        let shallow = format!("{}true{}", "(".repeat(3), ")".repeat(3));
        let deep = format!("{}true{}", "(".repeat(20), ")".repeat(20));

        assert_eq!(ev.evaluate(&shallow), ExpressionValue::Bool(true));
        assert_eq!(
            ev.try_evaluate(&deep),
            Err(EvalError::DepthExceeded { limit: 8 })
        );
        assert_eq!(ev.evaluate(&deep), ExpressionValue::Null);
    }

    fn ev_context() -> ExtendedEvaluationContext {
        evaluator().context().clone()
    }

    #[test]
    fn test_update_context() {
        let mut ev = evaluator();
        let mut form = ev.context().base.form.clone();
        form.insert("amount".to_string(), num(5000.0));
        ev.update_context(ContextPatch::new().with_form(form));

        assert_eq!(ev.evaluate("amount"), num(5000.0));
        assert_eq!(ev.evaluate("initiator"), text("user1"));
    }

    #[test]
    fn test_compare_op_display() {
        assert_eq!(format!("{}", CompareOp::StrictEq), "===");
        assert_eq!(format!("{}", CompareOp::NotEq), "!=");
        assert_eq!(format!("{}", CompareOp::Lte), "<=");
    }

    #[test]
    fn test_evaluate_boolean() {
        let ev = evaluator();
        assert!(ev.evaluate_boolean("items"));
        assert!(ev.evaluate_boolean("status"));
        assert!(!ev.evaluate_boolean("zero"));
        assert!(!ev.evaluate_boolean(""));
        assert!(!ev.evaluate_boolean("broken("));
    }
}
