// SPDX-License-Identifier: MIT

//! Runtime values and the coercion rules shared by every evaluator stage
//!
//! Resolution can fail to find anything at all, which is distinct from finding
//! an explicit `null`. That "undefined" state is modelled as `None` in an
//! `Option<&ExpressionValue>` / `Option<ExpressionValue>`, so the helpers here
//! take options rather than bare values.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Leading numeric prefix, as accepted by a lenient float parse
static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
        .expect("float prefix pattern is valid")
});

/// A complete decimal literal
static DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("decimal pattern is valid")
});

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A value produced or consumed by an expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ExpressionValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<ExpressionValue>),
    Map(HashMap<String, ExpressionValue>),
}

impl ExpressionValue {
    /// Collapse compound values to `Null`, leaving scalars untouched
    pub fn narrow(self) -> Self {
        match self {
            ExpressionValue::List(_) | ExpressionValue::Map(_) => ExpressionValue::Null,
            scalar => scalar,
        }
    }

    /// Turn an unresolved value into an explicit `Null`
    pub fn from_resolved(value: Option<ExpressionValue>) -> Self {
        value.unwrap_or(ExpressionValue::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ExpressionValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ExpressionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ExpressionValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExpressionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ExpressionValue]> {
        match self {
            ExpressionValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a single path segment: a map key, or an index into a list
    pub fn get(&self, segment: &str) -> Option<&ExpressionValue> {
        match self {
            ExpressionValue::Map(map) => map.get(segment),
            ExpressionValue::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }
}

impl ExpressionValue {
    /// JSON rendering with integral numbers written without a fraction.
    /// JSON has no infinities or NaN, those become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            ExpressionValue::Null => Value::Null,
            ExpressionValue::Bool(b) => Value::Bool(*b),
            ExpressionValue::Number(n) if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER => {
                Value::from(*n as i64)
            }
            ExpressionValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ExpressionValue::String(s) => Value::String(s.clone()),
            ExpressionValue::List(items) => {
                Value::Array(items.iter().map(ExpressionValue::to_json).collect())
            }
            ExpressionValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for ExpressionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_display_string(Some(self)))
    }
}

impl From<bool> for ExpressionValue {
    fn from(b: bool) -> Self {
        ExpressionValue::Bool(b)
    }
}

impl From<f64> for ExpressionValue {
    fn from(n: f64) -> Self {
        ExpressionValue::Number(n)
    }
}

impl From<i64> for ExpressionValue {
    fn from(n: i64) -> Self {
        ExpressionValue::Number(n as f64)
    }
}

impl From<&str> for ExpressionValue {
    fn from(s: &str) -> Self {
        ExpressionValue::String(s.to_string())
    }
}

impl From<String> for ExpressionValue {
    fn from(s: String) -> Self {
        ExpressionValue::String(s)
    }
}

impl From<Vec<ExpressionValue>> for ExpressionValue {
    fn from(items: Vec<ExpressionValue>) -> Self {
        ExpressionValue::List(items)
    }
}

impl From<serde_json::Value> for ExpressionValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ExpressionValue::Null,
            Value::Bool(b) => ExpressionValue::Bool(b),
            Value::Number(n) => ExpressionValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => ExpressionValue::String(s),
            Value::Array(items) => {
                ExpressionValue::List(items.into_iter().map(ExpressionValue::from).collect())
            }
            Value::Object(map) => ExpressionValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, ExpressionValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Truthiness used by logical operators and the boolean entry points
pub fn to_boolean(value: Option<&ExpressionValue>) -> bool {
    match value {
        None | Some(ExpressionValue::Null) => false,
        Some(ExpressionValue::Bool(b)) => *b,
        Some(ExpressionValue::String(s)) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
        Some(ExpressionValue::Number(n)) => *n != 0.0,
        Some(ExpressionValue::List(_)) | Some(ExpressionValue::Map(_)) => true,
    }
}

fn is_nullish(value: Option<&ExpressionValue>) -> bool {
    matches!(value, None | Some(ExpressionValue::Null))
}

/// Identity comparison (`===`): same kind and same value, undefined only equals undefined
pub fn strict_equals(a: Option<&ExpressionValue>, b: Option<&ExpressionValue>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Case-insensitive, number-coercing comparison (`==`)
pub fn loose_equals(a: Option<&ExpressionValue>, b: Option<&ExpressionValue>) -> bool {
    if strict_equals(a, b) {
        return true;
    }
    if is_nullish(a) {
        return is_nullish(b);
    }
    if is_nullish(b) {
        return false;
    }

    if to_display_string(a).to_lowercase() == to_display_string(b).to_lowercase() {
        return true;
    }

    let num_a = coerce_number(a);
    let num_b = coerce_number(b);
    !num_a.is_nan() && !num_b.is_nan() && num_a == num_b
}

/// Numeric coercion for ordering comparisons: numbers pass through, strings
/// are parsed leniently, everything else (and any parse failure) is `0`
pub fn to_number(value: Option<&ExpressionValue>) -> f64 {
    match value {
        Some(ExpressionValue::Number(n)) => *n,
        Some(ExpressionValue::String(s)) => parse_float(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Strict numeric conversion; `NaN` when the value has no numeric reading
pub fn coerce_number(value: Option<&ExpressionValue>) -> f64 {
    match value {
        None => f64::NAN,
        Some(ExpressionValue::Null) => 0.0,
        Some(ExpressionValue::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(ExpressionValue::Number(n)) => *n,
        Some(ExpressionValue::String(s)) => parse_number_strict(s),
        Some(list @ ExpressionValue::List(_)) => parse_number_strict(&to_display_string(Some(list))),
        Some(ExpressionValue::Map(_)) => f64::NAN,
    }
}

pub fn is_empty(value: Option<&ExpressionValue>) -> bool {
    match value {
        None | Some(ExpressionValue::Null) => true,
        Some(ExpressionValue::String(s)) => s.trim().is_empty(),
        Some(ExpressionValue::List(items)) => items.is_empty(),
        Some(ExpressionValue::Map(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Textual form of a value; undefined renders as `"undefined"`
pub fn to_display_string(value: Option<&ExpressionValue>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(ExpressionValue::Null) => "null".to_string(),
        Some(ExpressionValue::Bool(b)) => b.to_string(),
        Some(ExpressionValue::Number(n)) => format_number(*n),
        Some(ExpressionValue::String(s)) => s.clone(),
        Some(ExpressionValue::List(items)) => items
            .iter()
            .map(|item| match item {
                ExpressionValue::Null => String::new(),
                other => to_display_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(ExpressionValue::Map(_)) => "[object Object]".to_string(),
    }
}

/// Lenient float parse: reads the longest numeric prefix after leading
/// whitespace, `None` if there is none
pub fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let found = FLOAT_PREFIX.find(text)?.as_str();
    match found.trim_start_matches(['+', '-']) {
        "Infinity" if found.starts_with('-') => Some(f64::NEG_INFINITY),
        "Infinity" => Some(f64::INFINITY),
        _ => found.parse::<f64>().ok(),
    }
}

/// Whole-string numeric parse; blank text is `0`, anything unparseable `NaN`
fn parse_number_strict(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    if DECIMAL.is_match(text) {
        text.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// Shortest textual form of a number (`1000`, `12.5`, `1e+21`, `NaN`)
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let magnitude = n.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        };
    }
    format!("{}", n)
}
