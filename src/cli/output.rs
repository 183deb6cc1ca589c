//! Output and file helpers shared by the commands.

use std::io::{self, Write};
use std::path::Path;

use crate::{json, Graph};

/// Log info message (respects quiet flag)
pub fn log_info(msg: &str, quiet: bool) {
    if !quiet {
        eprintln!("{msg}");
    }
}

/// Write output to file or stdout
pub fn write_output(content: &str, path: Option<&Path>) -> Result<(), String> {
    if let Some(path) = path {
        std::fs::write(path, content)
            .map_err(|e| format!("Failed to write to {}: {e}", path.display()))?;
    } else {
        print!("{content}");
        io::stdout()
            .flush()
            .map_err(|e| format!("Failed to flush stdout: {e}"))?;
    }
    Ok(())
}

/// Read a graph from its JSON file.
pub fn read_graph(path: &Path) -> Result<Graph, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    json::from_str(&text).map_err(|e| format!("Failed to parse {}: {e}", path.display()))
}
