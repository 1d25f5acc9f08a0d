// SPDX-License-Identifier: MIT

//! Top-level scanning helpers
//!
//! Every structural match in the grammar works on raw text: an operator only
//! counts when it sits at bracket depth 0 and outside a quoted string. Quotes
//! may be single or double; a quote preceded by a backslash does not open or
//! close a literal. All delimiters are ASCII, so byte offsets found here are
//! always valid `str` slice boundaries.

use crate::error::EvalError;

/// Walks an expression left to right, tracking string literals and nesting
#[derive(Debug, Default)]
struct Scan {
    depth: i32,
    quote: Option<u8>,
}

impl Scan {
    /// Feed the byte at `i`
    fn feed(&mut self, bytes: &[u8], i: usize) {
        let c = bytes[i];
        if (c == b'"' || c == b'\'') && (i == 0 || bytes[i - 1] != b'\\') {
            match self.quote {
                None => self.quote = Some(c),
                Some(open) if open == c => self.quote = None,
                _ => {}
            }
        }
        if self.quote.is_some() {
            return;
        }
        match c {
            b'(' | b'[' => self.depth += 1,
            b')' | b']' => self.depth -= 1,
            _ => {}
        }
    }

    fn at_top(&self) -> bool {
        self.depth == 0 && self.quote.is_none()
    }
}

/// Split `expr` at every top-level occurrence of `op`.
///
/// Returns `[expr]` when the operator never appears at the top level.
pub fn split_by_operator<'a>(expr: &'a str, op: &str) -> Vec<&'a str> {
    let bytes = expr.as_bytes();
    let op = op.as_bytes();
    let mut parts = Vec::new();
    let mut scan = Scan::default();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        scan.feed(bytes, i);
        if scan.at_top() && bytes[i..].starts_with(op) {
            parts.push(&expr[start..i]);
            i += op.len();
            start = i;
            continue;
        }
        i += 1;
    }

    parts.push(&expr[start..]);
    parts
}

/// Split a comma separated list at top-level commas, trimming each piece.
///
/// Empty pieces between commas are kept, a trailing empty piece is dropped.
pub fn split_arguments(args: &str) -> Vec<&str> {
    let args = args.trim();
    if args.is_empty() {
        return Vec::new();
    }

    let mut pieces = split_by_operator(args, ",")
        .into_iter()
        .map(str::trim)
        .collect::<Vec<_>>();
    if pieces.last().is_some_and(|last| last.is_empty()) {
        pieces.pop();
    }
    pieces
}

/// Split the body of an array literal into its non-empty items
pub fn split_array_items(body: &str) -> Vec<&str> {
    split_by_operator(body, ",")
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

/// The three parts of a top-level `cond ? a : b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TernaryParts<'a> {
    pub condition: &'a str,
    pub when_true: &'a str,
    pub when_false: &'a str,
}

/// Locate the first top-level `?` and the `:` that closes it.
///
/// Each further `?` seen before the closing `:` opens a nested ternary that
/// has to consume one `:` of its own first.
pub fn split_ternary(expr: &str) -> Option<TernaryParts<'_>> {
    let bytes = expr.as_bytes();
    let mut scan = Scan::default();
    let mut question: Option<usize> = None;
    let mut nested = 0usize;

    for i in 0..bytes.len() {
        scan.feed(bytes, i);
        if !scan.at_top() {
            continue;
        }

        match (bytes[i], question) {
            (b'?', None) => question = Some(i),
            (b'?', Some(_)) => nested += 1,
            (b':', Some(q)) => {
                if nested > 0 {
                    nested -= 1;
                    continue;
                }
                return Some(TernaryParts {
                    condition: expr[..q].trim(),
                    when_true: expr[q + 1..i].trim(),
                    when_false: expr[i + 1..].trim(),
                });
            }
            _ => {}
        }
    }

    None
}

/// If the whole of `expr` is one `( ... )` group, return its inner text.
///
/// `(a) == (b)` is not a single group: its first parenthesis closes early.
pub fn enclosing_group(expr: &str) -> Option<&str> {
    let bytes = expr.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'(' || bytes[bytes.len() - 1] != b')' {
        return None;
    }

    let mut scan = Scan::default();
    for i in 0..bytes.len() - 1 {
        scan.feed(bytes, i);
        if scan.depth == 0 && scan.quote.is_none() {
            return None;
        }
    }
    Some(&expr[1..expr.len() - 1])
}

/// Reject unbalanced brackets and unterminated string literals
pub fn check_balanced(expr: &str) -> Result<(), EvalError> {
    let bytes = expr.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut quote: Option<u8> = None;

    for (i, &c) in bytes.iter().enumerate() {
        if (c == b'"' || c == b'\'') && (i == 0 || bytes[i - 1] != b'\\') {
            match quote {
                None => quote = Some(c),
                Some(open) if open == c => quote = None,
                _ => {}
            }
            continue;
        }
        if quote.is_some() {
            continue;
        }
        match c {
            b'(' | b'[' => stack.push(c),
            b')' | b']' => {
                let expected = if c == b')' { b'(' } else { b'[' };
                if stack.pop() != Some(expected) {
                    return Err(EvalError::malformed(
                        expr,
                        format!("unexpected '{}' at offset {}", c as char, i),
                    ));
                }
            }
            _ => {}
        }
    }

    if let Some(open) = quote {
        return Err(EvalError::malformed(
            expr,
            format!("unterminated {} string literal", open as char),
        ));
    }
    if let Some(open) = stack.pop() {
        return Err(EvalError::malformed(
            expr,
            format!("unclosed '{}'", open as char),
        ));
    }
    Ok(())
}
