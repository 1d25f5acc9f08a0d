// SPDX-License-Identifier: MIT

//! Safe expression evaluation for dynamic forms
//!
//! Expressions drive field visibility, validation and calculated values:
//! - `amount > 500 && status == 'pending'`
//! - `hasRole('admin') ? 'full' : 'limited'`
//! - `quantity * price`
//! - `grids.lines.sum('total')`
//!
//! Nothing here executes host code. Every construct is matched against the
//! text and evaluated by hand.

pub mod arithmetic;
mod evaluator;
pub mod functions;
pub mod grid;
mod modes;
pub mod splitter;
pub mod value;

pub use evaluator::{
    create_evaluator, create_safe_evaluator, strip_template, CompareOp, EvalResult,
    EvaluatorOptions, ExpressionEvaluator, Resolved,
};
pub use grid::GridAggregate;
pub use modes::{strip_statement, ValidationOutcome};
pub use value::ExpressionValue;
