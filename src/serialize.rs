//! Serializer and deserializer contracts, plus batch drivers.
//!
//! # Negotiation
//!
//! ```text
//!   configure(params, schema) ──► still-needed parameters
//!   load(streams, schema)     ──► parameters discovered in the input
//!   set_parameters(params)    ──► deserialize() ──► graphs
//! ```
//!
//! Errors while reading or writing one transcript are recorded in a
//! [`SerializationReport`] under that transcript's name, and the batch
//! moves on to the next one.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use annograph_core::{Graph, Schema};

use crate::config::ParameterSet;
use crate::error::{Error, Result};

/// A named chunk of serialized data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedStream {
    /// File name (no directory).
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Content.
    pub data: Vec<u8>,
}

impl NamedStream {
    /// Stream from bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a file; the MIME type is guessed from the extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_for(path), data))
    }

    /// Content as UTF-8.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.data)
            .map_err(|e| Error::serialization(format!("{} is not UTF-8: {e}", self.name)))
    }

    /// Write into `dir` under the stream's name.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.name);
        fs::write(&path, &self.data)?;
        Ok(path)
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Name and file types of a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationDescriptor {
    /// Human-readable format name.
    pub name: String,
    /// MIME type produced or accepted.
    pub mime_type: String,
    /// File suffixes, with dots.
    pub file_suffixes: Vec<String>,
}

/// Warnings and errors for one transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphReport {
    /// Recoverable oddities.
    pub warnings: Vec<String>,
    /// Failures; the transcript was skipped.
    pub errors: Vec<String>,
}

/// Per-transcript outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializationReport {
    graphs: BTreeMap<String, GraphReport>,
}

impl SerializationReport {
    /// Empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn warn(&mut self, graph_id: &str, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{graph_id}: {message}");
        self.entry(graph_id).warnings.push(message);
    }

    /// Record an error.
    pub fn error(&mut self, graph_id: &str, message: impl Into<String>) {
        let message = message.into();
        log::error!("{graph_id}: {message}");
        self.entry(graph_id).errors.push(message);
    }

    fn entry(&mut self, graph_id: &str) -> &mut GraphReport {
        self.graphs.entry(graph_id.to_string()).or_default()
    }

    /// Report for one transcript.
    #[must_use]
    pub fn get(&self, graph_id: &str) -> Option<&GraphReport> {
        self.graphs.get(graph_id)
    }

    /// Transcripts with at least one error.
    #[must_use]
    pub fn failed(&self) -> Vec<&str> {
        self.graphs
            .iter()
            .filter(|(_, r)| !r.errors.is_empty())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// True if any transcript failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.graphs.values().any(|r| !r.errors.is_empty())
    }

    /// True if nothing at all was reported.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.graphs
            .values()
            .all(|r| r.errors.is_empty() && r.warnings.is_empty())
    }

    /// All entries by transcript name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GraphReport)> + '_ {
        self.graphs.iter().map(|(id, r)| (id.as_str(), r))
    }
}

/// Reads transcripts in some format into graphs.
pub trait Deserializer {
    /// Format description.
    fn descriptor(&self) -> &SerializationDescriptor;

    /// Apply general settings; returns the parameters still required.
    fn configure(&mut self, config: &ParameterSet, schema: &Schema) -> Result<ParameterSet>;

    /// Take the input streams for one transcript; returns parameters that
    /// depend on the input (e.g. which tier maps to which layer).
    fn load(&mut self, streams: Vec<NamedStream>, schema: &Schema) -> Result<ParameterSet>;

    /// Final values for the parameters returned by [`Self::load`].
    fn set_parameters(&mut self, parameters: &ParameterSet) -> Result<()>;

    /// Build the graphs.
    fn deserialize(&mut self) -> Result<Vec<Graph>>;

    /// Warnings gathered since [`Self::load`].
    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Writes graphs in some format.
pub trait Serializer {
    /// Format description.
    fn descriptor(&self) -> &SerializationDescriptor;

    /// Apply general settings; returns the parameters still required.
    fn configure(&mut self, config: &ParameterSet, schema: &Schema) -> Result<ParameterSet>;

    /// Layers the format always needs.
    fn required_layers(&self) -> Vec<String> {
        Vec::new()
    }

    /// Serialize one graph, restricted to `layer_ids` when non-empty.
    fn serialize_graph(
        &self,
        graph: &Graph,
        layer_ids: &[String],
        warnings: &mut Vec<String>,
    ) -> Result<Vec<NamedStream>>;

    /// Serialize each graph, passing streams to `consumer`; failures are
    /// recorded in `report` and do not stop the batch.
    fn serialize<I, F>(&self, graphs: I, layer_ids: &[String], mut consumer: F, report: &mut SerializationReport)
    where
        Self: Sized,
        I: IntoIterator<Item = Graph>,
        F: FnMut(NamedStream),
    {
        for graph in graphs {
            let mut warnings = Vec::new();
            let outcome = self.serialize_graph(&graph, layer_ids, &mut warnings);
            for warning in warnings {
                report.warn(graph.id(), warning);
            }
            match outcome {
                Ok(streams) => streams.into_iter().for_each(&mut consumer),
                Err(e) => report.error(graph.id(), e.to_string()),
            }
        }
    }
}

/// Serialize `graphs`, collecting every stream.
pub fn serialize_batch<S: Serializer>(
    serializer: &S,
    graphs: Vec<Graph>,
    layer_ids: &[String],
) -> (Vec<NamedStream>, SerializationReport) {
    let mut report = SerializationReport::new();
    let mut streams = Vec::new();
    serializer.serialize(graphs, layer_ids, |s| streams.push(s), &mut report);
    (streams, report)
}

/// Deserialize several transcripts, one group of streams each.
///
/// A fresh deserializer comes from `factory` per transcript. `parameters`
/// supplies values for both negotiation steps; a transcript whose required
/// parameters are still missing is reported and skipped.
pub fn deserialize_batch<D, F>(
    factory: F,
    inputs: Vec<Vec<NamedStream>>,
    schema: &Schema,
    parameters: &ParameterSet,
) -> (Vec<Graph>, SerializationReport)
where
    D: Deserializer,
    F: Fn() -> D,
{
    let mut report = SerializationReport::new();
    let mut graphs = Vec::new();
    for streams in inputs {
        let name = streams
            .first()
            .map_or_else(|| "<empty>".to_string(), |s| s.name.clone());
        let mut deserializer = factory();
        match deserialize_one(&mut deserializer, streams, schema, parameters) {
            Ok(loaded) => graphs.extend(loaded),
            Err(e) => report.error(&name, e.to_string()),
        }
        for warning in deserializer.warnings() {
            report.warn(&name, warning);
        }
    }
    log::info!(
        "deserialized {} graphs, {} inputs failed",
        graphs.len(),
        report.failed().len()
    );
    (graphs, report)
}

fn deserialize_one<D: Deserializer>(
    deserializer: &mut D,
    streams: Vec<NamedStream>,
    schema: &Schema,
    parameters: &ParameterSet,
) -> Result<Vec<Graph>> {
    let mut needed = deserializer.configure(parameters, schema)?;
    needed.merge_values(parameters);
    needed.check_complete()?;
    let mut discovered = deserializer.load(streams, schema)?;
    discovered.merge_values(parameters);
    discovered.check_complete()?;
    deserializer.set_parameters(&discovered)?;
    deserializer.deserialize()
}
