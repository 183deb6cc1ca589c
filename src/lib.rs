//! # annograph
//!
//! Linguistic annotation graphs and the passes that transform them.
//!
//! The model itself (anchors, annotations, layers, change tracking and
//! fragments) lives in `annograph-core` and is re-exported here. This crate
//! adds what runs on top of it:
//!
//! - **Annotators**: the [`Annotator`] contract, with parallel fragment
//!   processing and cancellation
//! - **Batches**: [`FragmentBatch`] cuts a graph into per-utterance
//!   fragments, runs a pass on each and merges the edits back
//! - **Serialization**: the [`Serializer`] / [`Deserializer`] contracts and
//!   the native JSON codec
//! - **Validation**: [`validate`] re-checks every layer rule on a graph
//! - **Offsets**: [`OffsetGenerator`] spaces out boundaries left unset by
//!   splits and subdivisions
//! - **Configuration**: `key=value` [`TaskParameters`] and negotiated
//!   [`ParameterSet`]s
//!
//! ## Quick Start
//!
//! ```rust
//! use annograph::{json, validate, Confidence, Graph, Layer, Schema};
//!
//! let mut schema = Schema::conventional();
//! schema.add_layer(Layer::tag("pos").with_parent("word"))?;
//! let mut graph = Graph::new("interview.trs", schema);
//!
//! let a = graph.get_or_create_anchor_at(0.0, Confidence::Manual)?;
//! let b = graph.get_or_create_anchor_at(0.4, Confidence::Manual)?;
//! let who = graph.create_annotation("participant", "ann", a, a, None)?;
//! let turn = graph.create_annotation("turn", "ann", a, b, Some(who))?;
//! let word = graph.create_annotation("word", "yes", a, b, Some(turn))?;
//! graph.create_tag(word, "pos", "UH")?;
//!
//! assert!(validate(&graph).is_empty());
//! let back = json::from_str(&json::to_string(&graph, false)?)?;
//! assert_eq!(back.labels("pos"), vec!["UH"]);
//! # Ok::<(), annograph::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Adds |
//! |---------|---------|------|
//! | `cli` | yes | the `annograph` binary (`clap`, `env_logger`) |
//! | `fast-lock` | no | `parking_lot` locks in shared task state |

#![warn(missing_docs)]

pub mod annotator;
pub mod batch;
pub mod config;
mod error;
pub mod json;
pub mod offsets;
pub mod serialize;
pub mod sync;
pub mod validator;

#[cfg(feature = "cli")]
pub mod cli;

pub use annograph_core::{
    quantize, Alignment, Anchor, AnchorId, AnchorStore, Annotation, AnnotationId, AnnotationRef,
    AnnotationStore, Attribute, Change, ChangeKind, ChangeTracker, CommitSummary, Confidence,
    ConfidenceParseError, EntityRef, Every, FragmentId, FragmentSource, Graph, GraphConfig, IdMap,
    Layer, LayerFilter, MediaFile, MediaProvider, OffsetUnits, Role, Schema, Scratch, Value,
    ValueType, ROOT_LAYER_ID,
};

/// Errors raised by the graph model itself.
pub use annograph_core::Error as GraphError;

pub use annotator::{Annotator, Cancellation, TaskMonitor};
pub use batch::{BatchSummary, FragmentBatch};
pub use config::{Parameter, ParameterSet, TaskParameters};
pub use error::{Error, Result, TransformContext};
pub use json::{JsonDeserializer, JsonSerializer};
pub use offsets::{OffsetGenerator, OffsetSummary};
pub use serialize::{
    deserialize_batch, serialize_batch, Deserializer, GraphReport, NamedStream, SerializationDescriptor,
    SerializationReport, Serializer,
};
pub use validator::{has_errors, validate, Severity, ValidationIssue};
