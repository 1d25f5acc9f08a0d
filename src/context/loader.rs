// SPDX-License-Identifier: MIT

//! Context loader - YAML / JSON snapshot loading
//!
//! Collaborators that assemble a context outside the process (fixtures, the
//! CLI, recorded form sessions) hand it over as a YAML or JSON document.

use std::fs;
use std::path::Path;

use super::schema::ExtendedEvaluationContext;
use crate::error::ContextError;

/// Loads evaluation context snapshots from files or strings
pub struct ContextLoader;

impl ContextLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a context from a `.yaml`, `.yml` or `.json` file
    pub fn load_context<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<ExtendedEvaluationContext, ContextError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let content = fs::read_to_string(path)?;
        log::debug!("Loading context from {}", path.display());

        match extension.as_str() {
            "yaml" | "yml" => Self::parse_yaml(&content),
            "json" => Self::parse_json(&content),
            other => Err(ContextError::UnsupportedFormat(format!(
                "{} (extension '{}')",
                path.display(),
                other
            ))),
        }
    }

    /// Parse a context from a YAML string
    pub fn parse_yaml(content: &str) -> Result<ExtendedEvaluationContext, ContextError> {
        let ctx: ExtendedEvaluationContext = serde_yaml::from_str(content)?;
        Ok(ctx)
    }

    /// Parse a context from a JSON string
    pub fn parse_json(content: &str) -> Result<ExtendedEvaluationContext, ContextError> {
        let ctx: ExtendedEvaluationContext = serde_json::from_str(content)?;
        Ok(ctx)
    }
}

impl Default for ContextLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::value::ExpressionValue;
    use std::io::Write;

    #[test]
    fn test_parse_yaml_context() {
        let yaml = r#"
form:
  status: pending
  tags: [a, b]
process:
  priority: high
user:
  id: user1
  username: user1
  roles: [user, admin]
  groups: [engineering]
"#;
        let ctx = ContextLoader::parse_yaml(yaml).unwrap();
        assert_eq!(ctx.base.form["status"], ExpressionValue::from("pending"));
        assert_eq!(ctx.base.process["priority"], ExpressionValue::from("high"));
        assert_eq!(ctx.base.user.groups, vec!["engineering"]);
        assert!(ctx.grids.is_empty());
        assert!(ctx.task.is_none());
    }

    #[test]
    fn test_parse_json_context() {
        let json = r#"{"form": {"amount": 12.5}, "value": "abc"}"#;
        let ctx = ContextLoader::parse_json(json).unwrap();
        assert_eq!(ctx.base.form["amount"], ExpressionValue::Number(12.5));
        assert_eq!(ctx.value, Some(ExpressionValue::from("abc")));
    }

    #[test]
    fn test_empty_document_is_default_context() {
        let ctx = ContextLoader::parse_json("{}").unwrap();
        assert_eq!(ctx, ExtendedEvaluationContext::default());
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let yaml = r#"
form:
  - not a map
"#;
        assert!(matches!(
            ContextLoader::parse_yaml(yaml),
            Err(ContextError::Yaml(_))
        ));
    }

    #[test]
    fn test_load_context_by_extension() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("form-expr-loader-{}.yml", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "form:\n  amount: 5").unwrap();
        drop(file);

        let ctx = ContextLoader::new().load_context(&path).unwrap();
        assert_eq!(ctx.base.form["amount"], ExpressionValue::Number(5.0));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("form-expr-loader-{}.toml", std::process::id()));
        fs::write(&path, "form = {}").unwrap();

        let result = ContextLoader::new().load_context(&path);
        assert!(matches!(result, Err(ContextError::UnsupportedFormat(_))));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ContextLoader::new().load_context("/nonexistent/context.yaml");
        assert!(matches!(result, Err(ContextError::Io(_))));
    }
}
