// SPDX-License-Identifier: MIT

//! Namespaced variable lookup for dotted paths

use crate::expression::value::ExpressionValue;

use super::schema::{ExtendedEvaluationContext, Namespace};

/// Follow `parts` down from `value`. A `length` segment on a list yields its
/// size; anything missing along the way yields `None`.
fn get_nested(value: &ExpressionValue, parts: &[&str]) -> Option<ExpressionValue> {
    let Some((first, rest)) = parts.split_first() else {
        return Some(value.clone());
    };
    match (value, *first) {
        (ExpressionValue::List(items), "length") if rest.is_empty() => {
            Some(ExpressionValue::Number(items.len() as f64))
        }
        _ => get_nested(value.get(first)?, rest),
    }
}

fn get_in_namespace(namespace: &Namespace, parts: &[&str]) -> Option<ExpressionValue> {
    match parts.split_first() {
        None => Some(ExpressionValue::Map(namespace.clone())),
        Some((first, rest)) => get_nested(namespace.get(*first)?, rest),
    }
}

impl ExtendedEvaluationContext {
    /// Resolve a dotted variable path.
    ///
    /// A `form.`, `process.` or `user.` prefix pins the lookup to that
    /// namespace. Bare names try form fields, then process variables, then the
    /// top-level context entries (`task`, `value`, `grids`, ...).
    pub fn resolve_path(&self, path: &str) -> Option<ExpressionValue> {
        let parts: Vec<&str> = path.split('.').collect();
        let (head, rest) = parts.split_first()?;

        match *head {
            "form" => get_in_namespace(&self.base.form, rest),
            "process" => get_in_namespace(&self.base.process, rest),
            "user" => get_nested(&self.base.user.to_value(), rest),
            _ => get_in_namespace(&self.base.form, &parts)
                .or_else(|| get_in_namespace(&self.base.process, &parts))
                .or_else(|| get_nested(&self.root(head)?, rest)),
        }
    }

    /// A top-level context entry viewed as a plain value
    pub fn root(&self, key: &str) -> Option<ExpressionValue> {
        match key {
            "form" => Some(ExpressionValue::Map(self.base.form.clone())),
            "process" => Some(ExpressionValue::Map(self.base.process.clone())),
            "user" => Some(self.base.user.to_value()),
            "grids" => Some(ExpressionValue::Map(
                self.grids
                    .iter()
                    .map(|(name, grid)| (name.clone(), grid.to_value()))
                    .collect(),
            )),
            "task" => self.task.as_ref().map(|task| task.to_value()),
            "value" => self.value.clone(),
            _ => None,
        }
    }
}
