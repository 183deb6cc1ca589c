//! Extract command: cut a time window out of a graph as a fragment

use clap::Args;
use std::path::PathBuf;

use super::super::output::{log_info, read_graph, write_output};

use crate::json;

/// Cut a fragment out of a graph
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Graph JSON file
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Window start offset
    #[arg(short, long, allow_hyphen_values = true)]
    pub start: f64,

    /// Window end offset
    #[arg(short, long, allow_hyphen_values = true)]
    pub end: f64,

    /// Layer to copy (repeatable; all layers when omitted)
    #[arg(short, long = "layer", value_name = "LAYER")]
    pub layers: Vec<String>,

    /// Write the fragment here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Single-line JSON
    #[arg(long)]
    pub compact: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Run the extract command.
pub fn run(args: ExtractArgs) -> Result<(), String> {
    let graph = read_graph(&args.path)?;
    let layers: Vec<&str> = if args.layers.is_empty() {
        graph
            .schema()
            .layers()
            .filter(|l| !graph.schema().is_root(&l.id))
            .map(|l| l.id.as_str())
            .collect()
    } else {
        args.layers.iter().map(String::as_str).collect()
    };

    let fragment = graph
        .extract_fragment(args.start, args.end, &layers)
        .map_err(|e| format!("Extraction failed: {e}"))?;
    let text = json::to_string(&fragment, !args.compact).map_err(|e| e.to_string())? + "\n";
    write_output(&text, args.output.as_deref())?;

    log_info(
        &format!(
            "{}: {} annotations, {} anchors",
            fragment.id(),
            fragment.annotations().len(),
            fragment.anchors().len()
        ),
        args.quiet,
    );
    Ok(())
}
