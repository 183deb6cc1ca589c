//! Inspect command: layers, counts and anchors of one graph

use clap::Args;
use std::path::PathBuf;

use super::super::output::{read_graph, write_output};
use super::super::parser::OutputFormat;

use crate::Graph;

/// Summarize a graph's layers and contents
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Graph JSON file
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Output format
    #[arg(long, default_value = "human")]
    pub format: OutputFormat,
}

/// Run the inspect command.
pub fn run(args: InspectArgs) -> Result<(), String> {
    let graph = read_graph(&args.path)?;
    let output = match args.format {
        OutputFormat::Human => human(&graph),
        OutputFormat::Json => serde_json::to_string_pretty(&summary(&graph))
            .map_err(|e| format!("Failed to serialize summary: {e}"))?
            + "\n",
    };
    write_output(&output, None)
}

struct LayerRow {
    id: String,
    alignment: String,
    parent: String,
    live: usize,
}

fn rows(graph: &Graph) -> Vec<LayerRow> {
    let schema = graph.schema();
    schema
        .top_down()
        .into_iter()
        .filter(|l| !schema.is_root(&l.id))
        .map(|l| LayerRow {
            id: l.id.clone(),
            alignment: l.alignment.to_string(),
            parent: l.parent_id.clone().unwrap_or_default(),
            live: graph
                .annotations()
                .on_layer(&l.id)
                .filter_map(|id| graph.get(id))
                .filter(|a| a.is_live())
                .count(),
        })
        .collect()
}

fn anchor_counts(graph: &Graph) -> (usize, usize) {
    let live: Vec<_> = graph.anchors().iter().filter(|a| a.is_live()).collect();
    let set = live.iter().filter(|a| a.offset().is_some()).count();
    (live.len(), set)
}

fn human(graph: &Graph) -> String {
    let mut out = format!("graph: {}\n", graph.id());
    if let Some(corpus) = graph.corpus() {
        out.push_str(&format!("corpus: {corpus}\n"));
    }
    if let Some(source) = graph.source() {
        out.push_str(&format!(
            "fragment of: {} {}-{}\n",
            source.graph_id, source.start, source.end
        ));
    }
    let (anchors, set) = anchor_counts(graph);
    out.push_str(&format!("anchors: {anchors} ({set} with offsets)\n"));
    out.push_str("layers:\n");
    let rows = rows(graph);
    let width = rows.iter().map(|r| r.id.len()).max().unwrap_or(0);
    for row in rows {
        out.push_str(&format!(
            "  {:<width$}  {:<8}  {:<12}  {}\n",
            row.id,
            row.alignment,
            row.parent,
            row.live,
            width = width
        ));
    }
    out
}

fn summary(graph: &Graph) -> serde_json::Value {
    let (anchors, set) = anchor_counts(graph);
    let layers: Vec<serde_json::Value> = rows(graph)
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "id": r.id,
                "alignment": r.alignment,
                "parent": r.parent,
                "annotations": r.live,
            })
        })
        .collect();
    serde_json::json!({
        "id": graph.id(),
        "corpus": graph.corpus(),
        "fragment_of": graph.source(),
        "anchors": anchors,
        "anchors_with_offsets": set,
        "layers": layers,
    })
}
