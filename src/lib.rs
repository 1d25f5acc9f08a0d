// SPDX-License-Identifier: MIT

pub mod context;
pub mod error;
pub mod expression;

pub use context::{
    create_default_context, ContextLoader, ContextPatch, EvaluationContext, ExtendedContextPatch,
    ExtendedEvaluationContext, GridContext, TaskContext, UserContext,
};
pub use error::{ContextError, EvalError};
pub use expression::{
    create_evaluator, create_safe_evaluator, EvaluatorOptions, ExpressionEvaluator,
    ExpressionValue, ValidationOutcome,
};
