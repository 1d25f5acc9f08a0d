// SPDX-License-Identifier: MIT

//! Evaluation context definitions
//!
//! A context is an immutable snapshot from the evaluator's point of view. The
//! only way to change it is a patch that replaces whole top-level entries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::expression::value::{coerce_number, ExpressionValue};

/// Named values in one lookup namespace (form fields, process variables)
pub type Namespace = HashMap<String, ExpressionValue>;

/// A single grid row: column name to cell value
pub type Row = HashMap<String, ExpressionValue>;

/// The authenticated user
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UserContext {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Base context: form values, process variables and the current user
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EvaluationContext {
    #[serde(default)]
    pub form: Namespace,
    #[serde(default)]
    pub process: Namespace,
    #[serde(default)]
    pub user: UserContext,
}

/// Tabular data exposed to aggregate expressions
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GridContext {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default, rename = "selectedRows", skip_serializing_if = "Option::is_none")]
    pub selected_rows: Option<Vec<Row>>,
    #[serde(default, rename = "selectedRow", skip_serializing_if = "Option::is_none")]
    pub selected_row: Option<Row>,
}

/// The workflow task the form belongs to
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TaskContext {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "taskDefinitionKey")]
    pub task_definition_key: String,
}

/// Base context plus grids, task metadata and the value under validation
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ExtendedEvaluationContext {
    #[serde(flatten)]
    pub base: EvaluationContext,
    #[serde(default)]
    pub grids: HashMap<String, GridContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ExpressionValue>,
}

/// Partial update for [`EvaluationContext`]; present entries replace the old ones
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContextPatch {
    #[serde(default)]
    pub form: Option<Namespace>,
    #[serde(default)]
    pub process: Option<Namespace>,
    #[serde(default)]
    pub user: Option<UserContext>,
}

/// Partial update for [`ExtendedEvaluationContext`]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExtendedContextPatch {
    #[serde(flatten)]
    pub base: ContextPatch,
    #[serde(default)]
    pub grids: Option<HashMap<String, GridContext>>,
    #[serde(default)]
    pub task: Option<TaskContext>,
    #[serde(default)]
    pub value: Option<ExpressionValue>,
}

impl UserContext {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// The user as a map value, keyed the way expressions address it
    pub fn to_value(&self) -> ExpressionValue {
        let strings = |items: &[String]| {
            ExpressionValue::List(items.iter().map(|s| ExpressionValue::from(s.as_str())).collect())
        };
        ExpressionValue::Map(HashMap::from([
            ("id".to_string(), ExpressionValue::from(self.id.as_str())),
            ("username".to_string(), ExpressionValue::from(self.username.as_str())),
            ("roles".to_string(), strings(&self.roles)),
            ("groups".to_string(), strings(&self.groups)),
        ]))
    }
}

impl GridContext {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Numeric readings of a column, skipping cells with no numeric value
    pub fn column_numbers(&self, column: &str) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| coerce_number(row.get(column)))
            .filter(|n| !n.is_nan())
            .collect()
    }

    /// Sum of the numeric cells of a column
    pub fn sum(&self, column: &str) -> f64 {
        self.column_numbers(column).iter().fold(0.0, |total, n| total + n)
    }

    pub fn to_value(&self) -> ExpressionValue {
        let rows = |rows: &[Row]| {
            ExpressionValue::List(rows.iter().map(|r| ExpressionValue::Map(r.clone())).collect())
        };
        let mut map = HashMap::from([("rows".to_string(), rows(&self.rows))]);
        if let Some(selected) = &self.selected_rows {
            map.insert("selectedRows".to_string(), rows(selected));
        }
        if let Some(selected) = &self.selected_row {
            map.insert("selectedRow".to_string(), ExpressionValue::Map(selected.clone()));
        }
        ExpressionValue::Map(map)
    }
}

impl TaskContext {
    pub fn to_value(&self) -> ExpressionValue {
        ExpressionValue::Map(HashMap::from([
            ("id".to_string(), ExpressionValue::from(self.id.as_str())),
            ("name".to_string(), ExpressionValue::from(self.name.as_str())),
            (
                "taskDefinitionKey".to_string(),
                ExpressionValue::from(self.task_definition_key.as_str()),
            ),
        ]))
    }
}

impl EvaluationContext {
    /// Shallow merge: each entry present in the patch replaces the current one
    pub fn apply(&mut self, patch: ContextPatch) {
        if let Some(form) = patch.form {
            self.form = form;
        }
        if let Some(process) = patch.process {
            self.process = process;
        }
        if let Some(user) = patch.user {
            self.user = user;
        }
    }
}

impl ExtendedEvaluationContext {
    pub fn apply(&mut self, patch: ExtendedContextPatch) {
        self.base.apply(patch.base);
        if let Some(grids) = patch.grids {
            self.grids = grids;
        }
        if let Some(task) = patch.task {
            self.task = Some(task);
        }
        if let Some(value) = patch.value {
            self.value = Some(value);
        }
    }
}

impl From<EvaluationContext> for ExtendedEvaluationContext {
    fn from(base: EvaluationContext) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }
}

impl ContextPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form(mut self, form: Namespace) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_process(mut self, process: Namespace) -> Self {
        self.process = Some(process);
        self
    }

    pub fn with_user(mut self, user: UserContext) -> Self {
        self.user = Some(user);
        self
    }
}

impl ExtendedContextPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, base: ContextPatch) -> Self {
        self.base = base;
        self
    }

    pub fn with_grids(mut self, grids: HashMap<String, GridContext>) -> Self {
        self.grids = Some(grids);
        self
    }

    pub fn with_task(mut self, task: TaskContext) -> Self {
        self.task = Some(task);
        self
    }

    pub fn with_value(mut self, value: ExpressionValue) -> Self {
        self.value = Some(value);
        self
    }
}

impl From<ContextPatch> for ExtendedContextPatch {
    fn from(base: ContextPatch) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }
}

/// A context with empty namespaces and an anonymous user
pub fn create_default_context() -> EvaluationContext {
    EvaluationContext::default()
}
