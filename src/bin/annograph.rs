//! annograph - command-line tools for annotation graphs

use clap::Parser;
use std::process::ExitCode;

use annograph::cli::commands::{extract, fragment_id, inspect, validate};
use annograph::cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let result: Result<(), String> = match cli.command {
        Commands::FragmentId(args) => fragment_id::run(args),
        Commands::Inspect(args) => inspect::run(args),
        Commands::Validate(args) => validate::run(args),
        Commands::Extract(args) => extract::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
