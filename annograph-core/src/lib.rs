//! # annograph-core
//!
//! The annotation graph model shared by every annograph crate.
//!
//! A transcript is a [`Graph`]: time-point [`Anchor`]s, labeled
//! [`Annotation`]s spanning pairs of anchors, and a [`Schema`] of [`Layer`]s
//! that says which annotations may nest under which and how they align in
//! time.
//!
//! ```text
//!   anchors      n_1 ──── n_2 ──── n_3 ──── n_4
//!                 0.0     1.2      1.9      2.6
//!   turn         [─────────── "ann" ────────────]
//!   word         [─ "the" ─][─ "cat" ─][─ "sat" ─]
//!   pos          ◆ DT      ◆ NN      ◆ VBD            (zero-width tags)
//! ```
//!
//! This crate provides:
//! - **Model**: [`Graph`], [`Anchor`], [`Annotation`], [`Confidence`]
//! - **Schema**: [`Schema`], [`Layer`], [`Alignment`], [`LayerFilter`]
//! - **Queries**: [`AnnotationRef`] navigation, lazy [`Every`] traversal
//! - **Change tracking**: [`ChangeTracker`], [`Graph::commit`]
//! - **Fragments**: [`Graph::extract_fragment`], [`FragmentId`]
//!
//! ```rust
//! use annograph_core::{Confidence, Graph, Schema};
//!
//! let mut graph = Graph::new("interview.trs", Schema::conventional());
//! let a = graph.get_or_create_anchor_at(0.0, Confidence::Manual)?;
//! let b = graph.get_or_create_anchor_at(2.5, Confidence::Manual)?;
//! let who = graph.create_annotation("participant", "ann", a, a, None)?;
//! let turn = graph.create_annotation("turn", "ann", a, b, Some(who))?;
//! graph.create_annotation("word", "hello", a, b, Some(turn))?;
//!
//! assert_eq!(graph.labels("word"), vec!["hello"]);
//! # Ok::<(), annograph_core::Error>(())
//! ```

#![warn(missing_docs)]

pub mod anchor;
pub mod annotation;
pub mod change;
pub mod confidence;
pub mod config;
pub mod error;
pub mod fragment;
pub mod graph;
pub mod layer;
pub mod media;
pub mod query;
pub mod schema;
pub mod scratch;

pub use anchor::{quantize, Anchor, AnchorId, AnchorStore};
pub use annotation::{Annotation, AnnotationId, AnnotationStore};
pub use change::{Attribute, Change, ChangeKind, ChangeTracker, EntityRef, Value};
pub use confidence::{Confidence, ConfidenceParseError};
pub use config::{GraphConfig, OffsetUnits};
pub use error::{Error, Result};
pub use fragment::{FragmentId, FragmentSource, IdMap};
pub use graph::{CommitSummary, Graph};
pub use layer::{Alignment, Layer, ValueType};
pub use media::{MediaFile, MediaProvider};
pub use query::{AnnotationRef, Every};
pub use schema::{LayerFilter, Role, Schema, ROOT_LAYER_ID};
pub use scratch::Scratch;
