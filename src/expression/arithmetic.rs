// SPDX-License-Identifier: MIT

//! Arithmetic sub-grammar for calculated fields
//!
//! Identifiers are replaced by their numeric values first, then the text is
//! reduced with `+ -` binding loosest, `* / %` next, and parentheses, unary
//! minus and number literals last.

use once_cell::sync::Lazy;
use regex::Regex;

use super::evaluator::{strip_template, ExpressionEvaluator};
use super::splitter::enclosing_group;
use super::value::{format_number, parse_float, ExpressionValue};
use crate::error::EvalError;

static ALLOWED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-zA-Z_.\s+\-*/%()]+$").expect("arithmetic charset pattern is valid")
});

static LOGIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[=!<>&|]").expect("logic symbol pattern is valid"));

static HAS_OPERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+\-*/%]").expect("operator pattern is valid"));

const RESERVED: [&str; 4] = ["true", "false", "null", "undefined"];

/// Pure arithmetic: only arithmetic characters, no comparison or logical
/// symbols, and at least one operator
pub fn is_arithmetic_expression(expr: &str) -> bool {
    ALLOWED.is_match(expr) && !LOGIC.is_match(expr) && HAS_OPERATOR.is_match(expr)
}

/// Structural pre-check; anything rejected here evaluates to `0`
pub fn is_valid_arithmetic(expr: &str) -> bool {
    let expr = expr.trim();
    if expr.is_empty() || !ALLOWED.is_match(expr) {
        return false;
    }
    if expr.ends_with(['+', '-', '*', '/', '%']) || expr.starts_with(['+', '*', '/', '%']) {
        return false;
    }

    let mut depth = 0i32;
    for c in expr.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn is_operand_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.' || c == b')'
}

/// Whether the `+` / `-` at `i` is a binary operator rather than a sign.
///
/// It has to follow an operand, and not be the sign of an exponent such as
/// the one in `1e+21`. Any Unicode whitespace may sit between the two.
fn is_binary_sign(expr: &str, i: usize) -> bool {
    let before = expr[..i].trim_end();
    let bytes = before.as_bytes();
    let Some(&prev) = bytes.last() else {
        return false;
    };
    if !is_operand_byte(prev) {
        return false;
    }
    if matches!(prev, b'e' | b'E') && before.len() == i {
        let start = bytes[..bytes.len() - 1]
            .iter()
            .rposition(|c| !(c.is_ascii_alphanumeric() || *c == b'.'))
            .map_or(0, |p| p + 1);
        if bytes.get(start).is_some_and(u8::is_ascii_digit) {
            return false;
        }
    }
    true
}

/// Split at top-level operators accepted by `is_split`, keeping each
/// operator with the term that follows it. The first term carries `None`.
fn split_terms<'a>(
    expr: &'a str,
    is_split: impl Fn(&str, usize) -> bool,
) -> Vec<(Option<u8>, &'a str)> {
    let bytes = expr.as_bytes();
    let mut terms = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut op = None;

    for i in 0..bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ if depth == 0 && is_split(expr, i) => {
                terms.push((op, &expr[start..i]));
                op = Some(bytes[i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push((op, &expr[start..]));
    terms
}

/// Reduce substituted arithmetic text to a number.
///
/// Operators of one precedence level are applied left to right, so
/// `10 - 3 - 2` is `5`. Division by zero follows IEEE rules; modulo by zero
/// is `0`.
pub fn parse_arithmetic(expr: &str, depth: usize, max_depth: usize) -> Result<f64, EvalError> {
    if depth > max_depth {
        return Err(EvalError::depth_exceeded(max_depth));
    }
    let expr = expr.trim();
    let next = depth + 1;

    let terms = split_terms(expr, |expr, i| {
        matches!(expr.as_bytes()[i], b'+' | b'-') && is_binary_sign(expr, i)
    });
    if terms.len() > 1 {
        let mut total = 0.0;
        for (op, term) in terms {
            let value = parse_arithmetic(term, next, max_depth)?;
            match op {
                Some(b'-') => total -= value,
                Some(_) => total += value,
                None => total = value,
            }
        }
        return Ok(total);
    }

    let factors = split_terms(expr, |expr, i| {
        matches!(expr.as_bytes()[i], b'*' | b'/' | b'%')
    });
    if factors.len() > 1 {
        let mut product = 0.0;
        for (op, factor) in factors {
            let value = parse_arithmetic(factor, next, max_depth)?;
            product = match op {
                None => value,
                Some(b'*') => product * value,
                Some(b'/') => product / value,
                Some(_) if value == 0.0 => 0.0,
                Some(_) => product % value,
            };
        }
        return Ok(product);
    }

    if let Some(inner) = enclosing_group(expr) {
        return parse_arithmetic(inner, next, max_depth);
    }

    if let Some(operand) = expr.strip_prefix('-') {
        return Ok(-parse_arithmetic(operand, next, max_depth)?);
    }

    Ok(parse_float(expr).filter(|n| !n.is_nan()).unwrap_or(0.0))
}

impl ExpressionEvaluator {
    /// Evaluate `+ - * / % ( )` arithmetic, with variables read as numbers.
    ///
    /// Invalid input and failures give `0`.
    pub fn evaluate_arithmetic(&self, expression: &str) -> f64 {
        let expr = strip_template(expression);
        if !is_valid_arithmetic(expr) {
            log::debug!("Rejected arithmetic expression '{}'", expression);
            return 0.0;
        }

        let substituted = self.substitute_variables(expr);
        match parse_arithmetic(&substituted, 0, self.options().max_depth) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("Failed to evaluate arithmetic expression '{}': {}", expression, err);
                0.0
            }
        }
    }

    /// Replace every variable token with its numeric value, `0` when it has none.
    /// Reserved words and call-shaped tokens stay as written.
    pub(crate) fn substitute_variables(&self, expr: &str) -> String {
        let mut out = String::with_capacity(expr.len());
        let mut rest = expr;

        while let Some(c) = rest.chars().next() {
            if !(c.is_ascii_alphanumeric() || c == '_' || c == '.') {
                out.push(c);
                rest = &rest[c.len_utf8()..];
                continue;
            }

            let end = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'))
                .unwrap_or(rest.len());
            let (token, tail) = rest.split_at(end);
            rest = tail;

            let is_identifier = c.is_ascii_alphabetic() || c == '_';
            if !is_identifier || RESERVED.contains(&token) || tail.trim_start().starts_with('(') {
                out.push_str(token);
                continue;
            }

            let value = match self.resolve_variable(token) {
                Some(ExpressionValue::Number(n)) => n,
                Some(ExpressionValue::String(s)) => parse_float(&s).unwrap_or(0.0),
                _ => 0.0,
            };
            if value < 0.0 {
                out.push_str(&format!("({})", format_number(value)));
            } else {
                out.push_str(&format_number(value));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextPatch;
    use crate::expression::evaluator::create_evaluator;
    use serde_json::json;

    fn evaluator() -> ExpressionEvaluator {
        let patch: ContextPatch = serde_json::from_value(json!({
            "form": {
                "quantity": 4,
                "price": "12.5",
                "discount": -3,
                "label": "n/a",
                "flag": true,
                "order": {"lines": 3}
            },
            "process": {"rate": 0.5}
        }))
        .unwrap();
        create_evaluator(patch)
    }

    fn eval(expr: &str) -> f64 {
        parse_arithmetic(expr, 0, 64).unwrap()
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(eval("10 - 3 - 2"), 5.0);
        assert_eq!(eval("10 / 2 / 5"), 1.0);
        assert_eq!(eval("2 * 3 + 4 * 5"), 26.0);
        assert_eq!(eval("20 % 6 * 2"), 4.0);
    }

    #[test]
    fn test_parentheses_and_unary_minus() {
        assert_eq!(eval("(1 + 2) * 3"), 9.0);
        assert_eq!(eval("-(4 - 6)"), 2.0);
        assert_eq!(eval("5 - -3"), 8.0);
        assert_eq!(eval("2 * -3"), -6.0);
        assert_eq!(eval("-3 + 2"), -1.0);
    }

    #[test]
    fn test_zero_divisors() {
        assert_eq!(eval("7 % 0"), 0.0);
        assert_eq!(eval("1 / 0"), f64::INFINITY);
        assert_eq!(eval("-1 / 0"), f64::NEG_INFINITY);
        assert!(eval("0 / 0").is_nan());
    }

    #[test]
    fn test_exponent_literal_is_not_split() {
        assert_eq!(eval("1e+3 + 1"), 1001.0);
        assert_eq!(eval("2e-1 * 10"), 2.0);
    }

    #[test]
    fn test_unicode_whitespace_around_operators() {
        assert_eq!(eval("5\u{a0}-\u{a0}3"), 2.0);
        assert_eq!(eval("2\u{2003}*\u{3000}4 +\u{a0}1"), 9.0);
        assert!(is_valid_arithmetic("5\u{a0}-\u{a0}3"));
    }

    #[test]
    fn test_unparseable_operand_is_zero() {
        assert_eq!(eval("abc + 2"), 2.0);
        assert_eq!(eval("round(2) + 1"), 1.0);
    }

    #[test]
    fn test_depth_guard() {
        let deep = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert!(matches!(
            parse_arithmetic(&deep, 0, 16),
            Err(EvalError::DepthExceeded { limit: 16 })
        ));
        let long = vec!["1"; 500].join(" + ");
        assert_eq!(parse_arithmetic(&long, 0, 16).unwrap(), 500.0);
    }

    #[test]
    fn test_is_valid_arithmetic() {
        assert!(is_valid_arithmetic("a + (b * 2)"));
        assert!(is_valid_arithmetic("-a"));
        assert!(!is_valid_arithmetic(""));
        assert!(!is_valid_arithmetic("1 +"));
        assert!(!is_valid_arithmetic("* 2"));
        assert!(!is_valid_arithmetic("(1 + 2"));
        assert!(!is_valid_arithmetic("1 + 2)"));
        assert!(!is_valid_arithmetic("a == 1"));
        assert!(!is_valid_arithmetic(r#""a" + 1"#));
    }

    #[test]
    fn test_is_arithmetic_expression() {
        assert!(is_arithmetic_expression("quantity * price"));
        assert!(!is_arithmetic_expression("quantity"));
        assert!(!is_arithmetic_expression("quantity > 1"));
        assert!(!is_arithmetic_expression("a && b - 1"));
        assert!(!is_arithmetic_expression(r#"concat(a, "-")"#));
    }

    #[test]
    fn test_substitute_variables() {
        let ev = evaluator();
        assert_eq!(ev.substitute_variables("quantity * price"), "4 * 12.5");
        assert_eq!(ev.substitute_variables("10 - discount"), "10 - (-3)");
        assert_eq!(ev.substitute_variables("label + missing"), "0 + 0");
        assert_eq!(ev.substitute_variables("flag + true"), "0 + true");
        assert_eq!(ev.substitute_variables("round(rate) + 1.5"), "round(0.5) + 1.5");
        assert_eq!(ev.substitute_variables("order.lines * 2"), "3 * 2");
    }

    #[test]
    fn test_evaluate_arithmetic() {
        let ev = evaluator();
        assert_eq!(ev.evaluate_arithmetic("quantity * price"), 50.0);
        assert_eq!(ev.evaluate_arithmetic("quantity - discount"), 7.0);
        assert_eq!(ev.evaluate_arithmetic("(quantity + 1) * rate"), 2.5);
        assert_eq!(ev.evaluate_arithmetic("${quantity + 1}"), 5.0);
        assert_eq!(ev.evaluate_arithmetic("quantity +"), 0.0);
        assert_eq!(ev.evaluate_arithmetic("quantity > 1"), 0.0);
    }
}
