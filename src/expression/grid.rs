// SPDX-License-Identifier: MIT

//! Grid aggregates: `grids.<name>.sum('<col>')`, `avg`, `min`, `max`,
//! `count()` and `rows.length`

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::evaluator::ExpressionEvaluator;
use crate::context::GridContext;

static AGGREGATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^grids\.([a-zA-Z_][a-zA-Z0-9_]*)\.(sum|avg|min|max)\(['"]([a-zA-Z_][a-zA-Z0-9_]*)['"]\)$"#,
    )
    .expect("grid aggregate pattern is valid")
});

static COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^grids\.([a-zA-Z_][a-zA-Z0-9_]*)\.(?:rows\.length|count\(\))$")
        .expect("grid count pattern is valid")
});

/// Column aggregates over the numeric cells of a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridAggregate {
    Sum,
    Avg,
    Min,
    Max,
}

impl GridAggregate {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    /// Apply to a grid; an empty set of numbers gives `0`
    pub fn apply(self, grid: &GridContext, column: &str) -> f64 {
        match self {
            Self::Sum => grid.sum(column),
            Self::Avg => {
                let values = grid.column_numbers(column);
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
            Self::Min => extremum(grid.column_numbers(column), f64::min),
            Self::Max => extremum(grid.column_numbers(column), f64::max),
        }
    }
}

fn extremum(values: Vec<f64>, pick: fn(f64, f64) -> f64) -> f64 {
    values.into_iter().reduce(pick).unwrap_or(0.0)
}

/// Evaluate a grid aggregate expression.
///
/// `None` when `expr` is not one of the recognized shapes. A grid that does
/// not exist aggregates to `0`.
pub fn evaluate_grid_function(expr: &str, grids: &HashMap<String, GridContext>) -> Option<f64> {
    let expr = expr.trim();

    if let Some(caps) = AGGREGATE.captures(expr) {
        let aggregate = GridAggregate::parse(&caps[2])?;
        return Some(
            grids
                .get(&caps[1])
                .map_or(0.0, |grid| aggregate.apply(grid, &caps[3])),
        );
    }

    if let Some(caps) = COUNT.captures(expr) {
        return Some(grids.get(&caps[1]).map_or(0.0, |grid| grid.rows.len() as f64));
    }

    log::debug!("Not a grid expression: '{}'", expr);
    None
}

impl ExpressionEvaluator {
    /// Grid aggregate over the bound context's grids
    pub fn evaluate_grid_function(&self, expression: &str) -> Option<f64> {
        evaluate_grid_function(expression, &self.context().grids)
    }
}
