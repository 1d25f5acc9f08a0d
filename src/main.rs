// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use form_expr::{
    create_default_context, ContextLoader, EvaluatorOptions, ExpressionEvaluator,
    ExpressionValue, ExtendedEvaluationContext,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Context snapshot to evaluate against (YAML or JSON)
    #[arg(short, long, global = true)]
    context: Option<PathBuf>,

    /// Deepest expression nesting accepted
    #[arg(long, global = true, default_value_t = EvaluatorOptions::default().max_depth)]
    max_depth: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate an expression to a scalar
    Eval { expression: String },
    /// Evaluate an expression as a boolean
    Boolean { expression: String },
    /// Evaluate a field visibility rule
    Visibility { expression: String },
    /// Evaluate a field validation rule
    Validation { expression: String },
    /// Evaluate a calculated field
    Calculation { expression: String },
    /// Evaluate pure arithmetic
    Arithmetic { expression: String },
}

fn load_context(path: Option<&Path>) -> Result<ExtendedEvaluationContext> {
    match path {
        Some(path) => ContextLoader::new()
            .load_context(path)
            .with_context(|| format!("Failed to load context from {}", path.display())),
        None => Ok(create_default_context().into()),
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let context = load_context(args.context.as_deref())?;
    let options = EvaluatorOptions {
        max_depth: args.max_depth,
    };
    let evaluator = ExpressionEvaluator::with_options(context, options);

    let output = match &args.command {
        Commands::Eval { expression } => evaluator.evaluate(expression).to_json(),
        Commands::Boolean { expression } => evaluator.evaluate_boolean(expression).into(),
        Commands::Visibility { expression } => evaluator.evaluate_visibility(expression).into(),
        Commands::Validation { expression } => {
            serde_json::to_value(evaluator.evaluate_validation(expression))
                .context("Failed to serialize validation outcome")?
        }
        Commands::Calculation { expression } => {
            ExpressionValue::from_resolved(evaluator.evaluate_calculation(expression)).to_json()
        }
        Commands::Arithmetic { expression } => {
            ExpressionValue::Number(evaluator.evaluate_arithmetic(expression)).to_json()
        }
    };

    log::debug!("{:?} -> {}", args.command, output);
    println!("{}", output);
    Ok(())
}
