// SPDX-License-Identifier: MIT

//! Evaluation contexts
//!
//! This module provides:
//! - `EvaluationContext` / `ExtendedEvaluationContext` - the data an expression sees
//! - `ContextPatch` / `ExtendedContextPatch` - shallow partial updates
//! - `ContextLoader` - snapshot loading from YAML or JSON

pub mod loader;
mod schema;
mod store;

pub use loader::ContextLoader;
pub use schema::{
    create_default_context, ContextPatch, EvaluationContext, ExtendedContextPatch,
    ExtendedEvaluationContext, GridContext, Namespace, Row, TaskContext, UserContext,
};
