//! CLI argument parsing and structure definitions

use clap::{Parser, Subcommand, ValueEnum};

use super::commands::{ExtractArgs, FragmentIdArgs, InspectArgs, ValidateArgs};

/// Annotation graph tools
#[derive(Parser)]
#[command(name = "annograph")]
#[command(
    author,
    version,
    about = "Inspect, validate and cut annotation graphs",
    long_about = r#"
annograph - tools for temporally anchored annotation graphs

Graphs are read and written in annograph's JSON form.

EXAMPLES:
  annograph inspect interview.json
  annograph validate interview.json
  annograph extract interview.json --start 10 --end 20 --layer word
  annograph fragment-id format interview.trs 10 20
  annograph fragment-id parse interview.trs__10-20
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log debug messages (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Format or parse fragment ids
    #[command(visible_alias = "id")]
    FragmentId(FragmentIdArgs),

    /// Summarize a graph's layers and contents
    #[command(visible_alias = "i")]
    Inspect(InspectArgs),

    /// Check a graph against its layer rules
    #[command(visible_alias = "v")]
    Validate(ValidateArgs),

    /// Cut a fragment out of a graph
    #[command(visible_alias = "x")]
    Extract(ExtractArgs),
}

/// Output format for commands that report on a graph
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Human,
    /// JSON object
    Json,
}
