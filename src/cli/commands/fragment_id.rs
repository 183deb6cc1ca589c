//! Fragment-id command: format and parse `<graph>__<start>-<end>` ids

use clap::{Args, Subcommand};

use super::super::output::write_output;
use super::super::parser::OutputFormat;

use crate::FragmentId;

/// Format or parse fragment ids
#[derive(Args, Debug)]
pub struct FragmentIdArgs {
    #[command(subcommand)]
    pub action: FragmentIdAction,
}

#[derive(Subcommand, Debug)]
pub enum FragmentIdAction {
    /// Build the id of a window of a graph
    #[command(allow_negative_numbers = true)]
    Format {
        /// Source graph id
        graph: String,
        /// Window start offset
        start: f64,
        /// Window end offset
        end: f64,
        /// File extension to append (e.g. wav)
        #[arg(short, long)]
        extension: Option<String>,
    },
    /// Split an id into graph and window
    Parse {
        /// Fragment id, optionally with a file extension
        id: String,
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Run the fragment-id command.
pub fn run(args: FragmentIdArgs) -> Result<(), String> {
    let output = match args.action {
        FragmentIdAction::Format {
            graph,
            start,
            end,
            extension,
        } => format_id(&graph, start, end, extension.as_deref())?,
        FragmentIdAction::Parse { id, format } => parse_id(&id, format)?,
    };
    write_output(&output, None)
}

fn format_id(graph: &str, start: f64, end: f64, extension: Option<&str>) -> Result<String, String> {
    if graph.is_empty() {
        return Err("Graph id must not be empty".to_string());
    }
    if !start.is_finite() || !end.is_finite() {
        return Err(format!("Offsets must be finite, got {start} and {end}"));
    }
    let mut id = FragmentId::new(graph, start, end);
    if let Some(ext) = extension {
        id = id.with_extension(ext);
    }
    Ok(format!("{id}\n"))
}

fn parse_id(id: &str, format: OutputFormat) -> Result<String, String> {
    let parsed = FragmentId::parse(id).map_err(|e| e.to_string())?;
    Ok(match format {
        OutputFormat::Human => {
            let mut out = format!(
                "graph: {}\nstart: {}\nend: {}\n",
                parsed.graph_id, parsed.start, parsed.end
            );
            if let Some(ext) = &parsed.extension {
                out.push_str(&format!("extension: {ext}\n"));
            }
            out
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "graph_id": parsed.graph_id,
                "start": parsed.start,
                "end": parsed.end,
                "extension": parsed.extension,
            });
            serde_json::to_string_pretty(&value).map_err(|e| format!("Failed to serialize id: {e}"))? + "\n"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_then_parse() {
        let id = format_id("interview.trs", 1.5, 3.0, Some("wav")).unwrap();
        assert_eq!(id, "interview.trs__1.5-3.wav\n");
        let human = parse_id(id.trim(), OutputFormat::Human).unwrap();
        assert_eq!(human, "graph: interview.trs\nstart: 1.5\nend: 3\nextension: .wav\n");
    }

    #[test]
    fn parse_rejects_plain_ids() {
        assert!(parse_id("interview.trs", OutputFormat::Json).is_err());
    }
}
