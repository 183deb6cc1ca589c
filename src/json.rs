//! The graph's own JSON interchange form.
//!
//! One transcript per stream, exactly what `serde_json` produces for
//! [`Graph`]: schema, anchors, annotations and, for fragments, the source
//! reference. Indices are rebuilt on load.

use std::collections::BTreeSet;

use annograph_core::{Graph, Schema};

use crate::config::{Parameter, ParameterSet};
use crate::error::{Error, Result};
use crate::serialize::{Deserializer, NamedStream, SerializationDescriptor, Serializer};

/// MIME type of the interchange form.
pub const MIME_TYPE: &str = "application/json";

fn descriptor() -> SerializationDescriptor {
    SerializationDescriptor {
        name: "annograph JSON".to_string(),
        mime_type: MIME_TYPE.to_string(),
        file_suffixes: vec![".json".to_string()],
    }
}

/// Parse one graph from JSON text.
pub fn from_str(json: &str) -> Result<Graph> {
    Ok(serde_json::from_str(json)?)
}

/// Graph as JSON text.
pub fn to_string(graph: &Graph, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(graph)?
    } else {
        serde_json::to_string(graph)?
    })
}

/// Copy of `graph` without annotations on layers outside `layer_ids` and
/// their ancestors. Unknown ids are returned separately.
pub fn restrict(graph: &Graph, layer_ids: &[String]) -> Result<(Graph, Vec<String>)> {
    let schema = graph.schema();
    let mut keep = BTreeSet::new();
    let mut unknown = Vec::new();
    for id in layer_ids {
        if !schema.contains(id) {
            unknown.push(id.clone());
            continue;
        }
        keep.insert(id.clone());
        keep.extend(schema.ancestors(id).into_iter().map(|l| l.id.clone()));
    }
    let mut copy = graph.clone();
    let drop: Vec<String> = schema
        .top_down()
        .into_iter()
        .map(|l| l.id.clone())
        .filter(|id| !keep.contains(id) && !schema.is_root(id))
        .collect();
    for id in drop {
        copy.destroy_all(&id)?;
    }
    Ok((copy, unknown))
}

/// Writes graphs as JSON.
#[derive(Debug, Clone)]
pub struct JsonSerializer {
    descriptor: SerializationDescriptor,
    pretty: bool,
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self {
            descriptor: descriptor(),
            pretty: true,
        }
    }
}

impl JsonSerializer {
    /// Pretty-printing serializer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compact output.
    #[must_use]
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }
}

impl Serializer for JsonSerializer {
    fn descriptor(&self) -> &SerializationDescriptor {
        &self.descriptor
    }

    fn configure(&mut self, config: &ParameterSet, _schema: &Schema) -> Result<ParameterSet> {
        if let Some(value) = config.get("pretty").and_then(|p| p.value.as_ref()) {
            self.pretty = value
                .as_bool()
                .ok_or_else(|| Error::configuration("parameter 'pretty' must be true or false"))?;
        }
        Ok(ParameterSet::new())
    }

    fn serialize_graph(
        &self,
        graph: &Graph,
        layer_ids: &[String],
        warnings: &mut Vec<String>,
    ) -> Result<Vec<NamedStream>> {
        let json = if layer_ids.is_empty() {
            to_string(graph, self.pretty)?
        } else {
            let (restricted, unknown) = restrict(graph, layer_ids)?;
            warnings.extend(unknown.into_iter().map(|id| format!("no layer '{id}' to serialize")));
            to_string(&restricted, self.pretty)?
        };
        let name = if graph.id().ends_with(".json") {
            graph.id().to_string()
        } else {
            format!("{}.json", graph.id())
        };
        Ok(vec![NamedStream::new(name, MIME_TYPE, json)])
    }
}

/// Reads graphs from JSON.
///
/// With `use_file_schema` false, each graph's schema is replaced by the one
/// given to [`Deserializer::load`], which must define every layer the file
/// uses.
#[derive(Debug, Clone)]
pub struct JsonDeserializer {
    descriptor: SerializationDescriptor,
    streams: Vec<NamedStream>,
    schema: Option<Schema>,
    use_file_schema: bool,
    warnings: Vec<String>,
}

impl Default for JsonDeserializer {
    fn default() -> Self {
        Self {
            descriptor: descriptor(),
            streams: Vec::new(),
            schema: None,
            use_file_schema: true,
            warnings: Vec::new(),
        }
    }
}

impl JsonDeserializer {
    /// Deserializer keeping each file's own schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, stream: &NamedStream) -> Result<(Graph, Vec<String>)> {
        let mut graph: Graph = serde_json::from_slice(&stream.data)
            .map_err(|e| Error::serialization(format!("{}: {e}", stream.name)))?;
        let mut warnings = Vec::new();
        if let Some(schema) = self.schema.as_ref().filter(|_| !self.use_file_schema) {
            let used: BTreeSet<&str> = graph.annotations().iter().map(|a| a.layer_id()).collect();
            let missing: Vec<&str> = used.into_iter().filter(|id| !schema.contains(id)).collect();
            if !missing.is_empty() {
                return Err(Error::serialization(format!(
                    "{}: layers {} are not in the target schema",
                    stream.name,
                    missing.join(", ")
                )));
            }
            for layer in graph.schema().layers() {
                if !schema.contains(&layer.id) {
                    warnings.push(format!("{}: unused layer '{}' dropped", stream.name, layer.id));
                }
            }
            *graph.schema_mut() = schema.clone();
        }
        Ok((graph, warnings))
    }
}

impl Deserializer for JsonDeserializer {
    fn descriptor(&self) -> &SerializationDescriptor {
        &self.descriptor
    }

    fn configure(&mut self, _config: &ParameterSet, schema: &Schema) -> Result<ParameterSet> {
        self.schema = Some(schema.clone());
        Ok(ParameterSet::new())
    }

    fn load(&mut self, streams: Vec<NamedStream>, schema: &Schema) -> Result<ParameterSet> {
        if streams.is_empty() {
            return Err(Error::serialization("no input streams"));
        }
        for stream in &streams {
            if stream.mime_type != MIME_TYPE && !stream.name.ends_with(".json") {
                self.warnings
                    .push(format!("{}: '{}' is not JSON, reading anyway", stream.name, stream.mime_type));
            }
        }
        self.streams = streams;
        self.schema = Some(schema.clone());
        Ok(ParameterSet::new().with(
            Parameter::new("use_file_schema")
                .with_label("Use file schema")
                .with_hint("Keep the layer definitions stored in the file instead of the target schema")
                .with_value(self.use_file_schema),
        ))
    }

    fn set_parameters(&mut self, parameters: &ParameterSet) -> Result<()> {
        if let Some(value) = parameters.get("use_file_schema").and_then(|p| p.value.as_ref()) {
            self.use_file_schema = value
                .as_bool()
                .ok_or_else(|| Error::configuration("parameter 'use_file_schema' must be true or false"))?;
        }
        Ok(())
    }

    fn deserialize(&mut self) -> Result<Vec<Graph>> {
        let mut graphs = Vec::with_capacity(self.streams.len());
        for stream in &self.streams {
            let (graph, warnings) = self.read(stream)?;
            self.warnings.extend(warnings);
            graphs.push(graph);
        }
        Ok(graphs)
    }

    fn warnings(&self) -> Vec<String> {
        self.warnings.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::{deserialize_batch, serialize_batch};
    use annograph_core::{Confidence, Layer};

    fn sample(id: &str) -> Graph {
        let mut schema = Schema::conventional();
        schema.add_layer(Layer::tag("pos").with_parent("word")).unwrap();
        let mut g = Graph::new(id, schema);
        let a = g.get_or_create_anchor_at(0.0, Confidence::Manual).unwrap();
        let b = g.get_or_create_anchor_at(1.0, Confidence::Manual).unwrap();
        let who = g.create_annotation("participant", "p", a, a, None).unwrap();
        let turn = g.create_annotation("turn", "p", a, b, Some(who)).unwrap();
        let word = g.create_annotation("word", "hi", a, b, Some(turn)).unwrap();
        g.create_tag(word, "pos", "UH").unwrap();
        g
    }

    #[test]
    fn batch_roundtrip_keeps_structure() {
        let graphs = vec![sample("a.trs"), sample("b.trs")];
        let (streams, report) = serialize_batch(&JsonSerializer::new(), graphs, &[]);
        assert!(report.is_clean());
        assert_eq!(streams[0].name, "a.trs.json");

        let inputs = streams.into_iter().map(|s| vec![s]).collect();
        let (back, report) = deserialize_batch(
            JsonDeserializer::new,
            inputs,
            &Schema::conventional(),
            &ParameterSet::new(),
        );
        assert!(!report.has_errors());
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].id(), "b.trs");
        assert_eq!(back[0].labels("pos"), vec!["UH"]);
        let word = back[0].first("word").unwrap();
        assert_eq!(word.first("participant").unwrap().label(), "p");
    }

    #[test]
    fn restricted_output_drops_other_layers() {
        let g = sample("a.trs");
        let mut warnings = Vec::new();
        let streams = JsonSerializer::new()
            .compact()
            .serialize_graph(&g, &["turn".to_string(), "nope".to_string()], &mut warnings)
            .unwrap();
        let back = from_str(streams[0].text().unwrap()).unwrap();
        assert_eq!(back.labels("turn"), vec!["p"]);
        assert_eq!(back.labels("participant"), vec!["p"]);
        assert!(back.labels("word").is_empty());
        assert_eq!(warnings, vec!["no layer 'nope' to serialize"]);
    }

    #[test]
    fn bad_input_reported_not_fatal() {
        let good = NamedStream::new("good.json", MIME_TYPE, to_string(&sample("good"), false).unwrap());
        let bad = NamedStream::new("bad.json", MIME_TYPE, "{ not json");
        let (graphs, report) = deserialize_batch(
            JsonDeserializer::new,
            vec![vec![bad], vec![good]],
            &Schema::conventional(),
            &ParameterSet::new(),
        );
        assert_eq!(graphs.len(), 1);
        assert_eq!(report.failed(), vec!["bad.json"]);
    }

    #[test]
    fn schema_without_layers_is_an_error() {
        let mut value: serde_json::Value = serde_json::from_str(&to_string(&sample("a"), false).unwrap()).unwrap();
        value["schema"]["layers"] = serde_json::json!([]);
        let err = from_str(&value.to_string()).unwrap_err();
        assert!(matches!(err, Error::Json(_)), "{err:?}");
    }

    #[test]
    fn target_schema_must_cover_file_layers() {
        let stream = NamedStream::new("a.json", MIME_TYPE, to_string(&sample("a"), false).unwrap());
        let params = ParameterSet::new().with(Parameter::new("use_file_schema").with_value(false));
        let (graphs, report) = deserialize_batch(
            JsonDeserializer::new,
            vec![vec![stream]],
            &Schema::conventional(),
            &params,
        );
        assert!(graphs.is_empty());
        assert!(report.get("a.json").unwrap().errors[0].contains("pos"));
    }
}
