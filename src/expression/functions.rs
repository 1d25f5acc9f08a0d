// SPDX-License-Identifier: MIT

//! Built-in helper functions
//!
//! Every helper is total: bad or missing arguments degrade to a neutral
//! result instead of failing. Arguments arrive already evaluated.

use regex::Regex;

use super::evaluator::{ExpressionEvaluator, Resolved};
use super::splitter::{enclosing_group, split_arguments};
use super::value::{is_empty, loose_equals, to_display_string, to_number, ExpressionValue};
use crate::context::UserContext;
use crate::error::EvalError;

/// `name(arg, ...)` with the raw argument texts
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall<'a> {
    pub name: &'a str,
    pub args: Vec<&'a str>,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Recognize `identifier( ... )` where the opening parenthesis closes last
pub fn parse_function_call(expr: &str) -> Option<FunctionCall<'_>> {
    let open = expr.find('(')?;
    if open == 0 || !expr.ends_with(')') {
        return None;
    }
    let name = expr[..open].trim();
    if !is_identifier(name) {
        return None;
    }
    let inner = enclosing_group(&expr[open..])?;
    Some(FunctionCall {
        name,
        args: split_arguments(inner),
    })
}

impl ExpressionEvaluator {
    /// Evaluate `expr` as a helper call.
    ///
    /// `Ok(None)` when the text is not call-shaped or names an unknown helper;
    /// the caller then treats the text as a literal or variable.
    pub(crate) fn eval_function_call(
        &self,
        expr: &str,
        depth: usize,
    ) -> Result<Option<Resolved>, EvalError> {
        let Some(call) = parse_function_call(expr) else {
            return Ok(None);
        };

        let values = call
            .args
            .iter()
            .map(|arg| self.eval_expr(arg, depth))
            .collect::<Result<Vec<_>, _>>()?;

        let result = call_function(call.name, &values, &self.context().base.user);
        if result.is_none() {
            log::debug!("Unknown function '{}' in expression '{}'", call.name, expr);
        }
        Ok(result)
    }
}

fn arg(args: &[Resolved], index: usize) -> Option<&ExpressionValue> {
    args.get(index).and_then(Option::as_ref)
}

/// String form of an argument, with null and undefined read as ""
fn text(args: &[Resolved], index: usize) -> String {
    match arg(args, index) {
        None | Some(ExpressionValue::Null) => String::new(),
        value => to_display_string(value),
    }
}

fn number(args: &[Resolved], index: usize) -> f64 {
    to_number(arg(args, index))
}

/// Role / group names given either as one list argument or as varargs
fn names(args: &[Resolved]) -> Vec<String> {
    if let [Some(ExpressionValue::List(items))] = args {
        return items
            .iter()
            .map(|item| to_display_string(Some(item)))
            .collect();
    }
    args.iter()
        .map(|value| to_display_string(value.as_ref()))
        .collect()
}

fn build_regex(pattern: &str, flags: &str) -> Option<Regex> {
    let mut inline = String::new();
    for flag in flags.chars() {
        match flag {
            'i' | 'm' | 's' => {
                if !inline.contains(flag) {
                    inline.push(flag);
                }
            }
            // global / unicode / sticky have no effect on a single test
            'g' | 'u' | 'y' => {}
            _ => return None,
        }
    }
    let source = if inline.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", inline, pattern)
    };
    Regex::new(&source).ok()
}

fn substring(text: &str, start: f64, end: Option<f64>) -> String {
    let chars: Vec<char> = text.chars().collect();
    let clamp = |n: f64| {
        if n.is_nan() {
            0
        } else {
            n.max(0.0).min(chars.len() as f64) as usize
        }
    };
    let start = clamp(start);
    let end = end.map_or(chars.len(), clamp);
    let (from, to) = if start <= end { (start, end) } else { (end, start) };
    chars[from..to].iter().collect()
}

fn at(collection: Option<&ExpressionValue>, index: f64) -> ExpressionValue {
    let resolve = |len: usize| -> Option<usize> {
        if index.is_nan() {
            return if len > 0 { Some(0) } else { None };
        }
        let i = if index < 0.0 { len as f64 + index } else { index };
        (i >= 0.0 && i < len as f64).then_some(i as usize)
    };
    match collection {
        Some(ExpressionValue::List(items)) => resolve(items.len())
            .map(|i| items[i].clone())
            .unwrap_or(ExpressionValue::Null),
        Some(ExpressionValue::String(s)) => {
            let chars: Vec<char> = s.chars().collect();
            resolve(chars.len())
                .map(|i| ExpressionValue::String(chars[i].to_string()))
                .unwrap_or(ExpressionValue::Null)
        }
        _ => ExpressionValue::Null,
    }
}

fn round(value: f64, precision: f64) -> f64 {
    let precision = precision.floor().max(0.0);
    let factor = 10f64.powf(precision);
    (value * factor + 0.5).floor() / factor
}

/// Dispatch a helper by name.
///
/// Returns `None` for an unknown name; otherwise the helper's result, which
/// is itself `None` only when the helper passes an undefined value through.
pub fn call_function(name: &str, args: &[Resolved], user: &UserContext) -> Option<Resolved> {
    use ExpressionValue::{Bool, List, Null, Number, String as Str};

    let value = match name {
        "hasRole" => Bool(user.has_role(&text(args, 0))),
        "hasGroup" => Bool(user.has_group(&text(args, 0))),
        "hasAnyRole" => Bool(names(args).iter().any(|r| user.has_role(r))),
        "hasAnyGroup" => Bool(names(args).iter().any(|g| user.has_group(g))),
        "hasAllRoles" => Bool(names(args).iter().all(|r| user.has_role(r))),
        "hasAllGroups" => Bool(names(args).iter().all(|g| user.has_group(g))),

        "isEmpty" => Bool(is_empty(arg(args, 0))),
        "isNotEmpty" => Bool(!is_empty(arg(args, 0))),

        "startsWith" => Bool(text(args, 0).starts_with(&text(args, 1))),
        "endsWith" => Bool(text(args, 0).ends_with(&text(args, 1))),
        "includes" => match arg(args, 0) {
            Some(List(items)) => Bool(
                items
                    .iter()
                    .any(|item| loose_equals(Some(item), arg(args, 1))),
            ),
            _ => Bool(text(args, 0).contains(&text(args, 1))),
        },
        "matches" => Bool(
            build_regex(&text(args, 1), &text(args, 2)).is_some_and(|re| re.is_match(&text(args, 0))),
        ),

        "len" => Number(match arg(args, 0) {
            Some(Str(s)) => s.chars().count() as f64,
            Some(List(items)) => items.len() as f64,
            Some(ExpressionValue::Map(map)) => map.len() as f64,
            _ => 0.0,
        }),
        "lower" => Str(text(args, 0).to_lowercase()),
        "upper" => Str(text(args, 0).to_uppercase()),
        "trim" => Str(text(args, 0).trim().to_string()),
        "concat" => Str((0..args.len()).map(|i| text(args, i)).collect()),
        "replace" => Str(text(args, 0).replacen(&text(args, 1), &text(args, 2), 1)),
        "substring" => {
            let end = args.get(2).and_then(|end| end.as_ref()).map(|end| to_number(Some(end)));
            Str(substring(&text(args, 0), number(args, 1).floor(), end.map(f64::floor)))
        }
        "at" => at(arg(args, 0), number(args, 1).floor()),

        "between" => {
            let value = number(args, 0);
            Bool(value >= number(args, 1) && value <= number(args, 2))
        }
        "min" => Number(
            (0..args.len())
                .map(|i| number(args, i))
                .fold(f64::INFINITY, f64::min),
        ),
        "max" => Number(
            (0..args.len())
                .map(|i| number(args, i))
                .fold(f64::NEG_INFINITY, f64::max),
        ),
        "abs" => Number(number(args, 0).abs()),
        "round" => Number(round(number(args, 0), number(args, 1))),
        "ceil" => Number(number(args, 0).ceil()),
        "floor" => Number(number(args, 0).floor()),

        "coalesce" => args
            .iter()
            .flatten()
            .find(|value| !value.is_null())
            .cloned()
            .unwrap_or(Null),
        "defaultIfBlank" => match arg(args, 0) {
            Some(Str(s)) if s.trim().is_empty() => arg(args, 1).cloned().unwrap_or(Null),
            _ => return Some(args.first().cloned().flatten()),
        },

        _ => return None,
    };
    Some(Some(value))
}
