//! Validate command: re-check every layer rule on a graph

use clap::Args;
use std::path::PathBuf;

use super::super::output::{log_info, read_graph, write_output};
use super::super::parser::OutputFormat;

use crate::validator::{validate, Severity, ValidationIssue};

/// Check a graph against its layer rules
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Graph JSON file
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Output format
    #[arg(long, default_value = "human")]
    pub format: OutputFormat,

    /// Only report errors, not warnings
    #[arg(long)]
    pub errors_only: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Run the validate command.
pub fn run(args: ValidateArgs) -> Result<(), String> {
    let graph = read_graph(&args.path)?;
    let mut issues = validate(&graph);
    if args.errors_only {
        issues.retain(|i| i.severity() == Severity::Error);
    }
    let errors = issues.iter().filter(|i| i.severity() == Severity::Error).count();
    let warnings = issues.len() - errors;

    let output = render(&issues, args.format)?;
    write_output(&output, None)?;
    log_info(
        &format!("{}: {errors} errors, {warnings} warnings", graph.id()),
        args.quiet,
    );

    if errors > 0 {
        Err(format!("{} is invalid ({errors} errors)", args.path.display()))
    } else {
        Ok(())
    }
}

fn render(issues: &[ValidationIssue], format: OutputFormat) -> Result<String, String> {
    Ok(match format {
        OutputFormat::Human => issues
            .iter()
            .map(|i| format!("{}: {i}\n", i.severity()))
            .collect(),
        OutputFormat::Json => {
            let list: Vec<serde_json::Value> = issues
                .iter()
                .map(|i| {
                    serde_json::json!({
                        "severity": i.severity().to_string(),
                        "message": i.to_string(),
                    })
                })
                .collect();
            serde_json::to_string_pretty(&list).map_err(|e| format!("Failed to serialize issues: {e}"))? + "\n"
        }
    })
}
