//! Layer definitions: the structural rules of one tier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How annotations on a layer relate to the time line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Tag: zero width, attached to an instant its parent already defines.
    #[default]
    None,
    /// A labeled point.
    Instant,
    /// A labeled span with independent start and end.
    Interval,
}

impl Alignment {
    /// True for layers whose annotations are always zero width.
    #[must_use]
    pub fn is_zero_width(self) -> bool {
        !matches!(self, Self::Interval)
    }

    /// True for layers that carry their own time information.
    #[must_use]
    pub fn is_aligned(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Instant => "instant",
            Self::Interval => "interval",
        })
    }
}

/// What kind of label a layer holds; formatting only, no structural effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Free text.
    #[default]
    Text,
    /// Numeric values.
    Number,
    /// Boolean flags.
    Boolean,
    /// International Phonetic Alphabet transcription.
    Ipa,
    /// One-character-per-phoneme encoding (DISC and similar).
    Disc,
    /// Anything else, by name.
    Other(String),
}

/// A tier definition.
///
/// Defaults follow the permissive end of every rule: many peers, overlap
/// allowed, saturated, contained in the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Unique id within the schema.
    pub id: String,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// Alignment kind.
    #[serde(default)]
    pub alignment: Alignment,
    /// More than one sibling of this layer may exist under one parent.
    #[serde(default = "yes")]
    pub peers: bool,
    /// Siblings' spans may overlap.
    #[serde(default = "yes")]
    pub peers_overlap: bool,
    /// Siblings must jointly cover the parent's extent.
    #[serde(default = "yes")]
    pub saturated: bool,
    /// Parent layer; `None` only for the root.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Children must lie within their parent's span.
    #[serde(default = "yes")]
    pub parent_includes: bool,
    /// Label type.
    #[serde(default)]
    pub value_type: ValueType,
    /// Free grouping used by front ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Closed label vocabulary (label -> description), empty when open.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub valid_labels: BTreeMap<String, String>,
}

fn yes() -> bool {
    true
}

impl Layer {
    /// A tag layer with default rules.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            alignment: Alignment::None,
            peers: true,
            peers_overlap: true,
            saturated: true,
            parent_id: None,
            parent_includes: true,
            value_type: ValueType::Text,
            category: None,
            valid_labels: BTreeMap::new(),
        }
    }

    /// An interval layer.
    #[must_use]
    pub fn interval(id: impl Into<String>) -> Self {
        Self::new(id).with_alignment(Alignment::Interval)
    }

    /// An instant layer.
    #[must_use]
    pub fn instant(id: impl Into<String>) -> Self {
        Self::new(id).with_alignment(Alignment::Instant)
    }

    /// A tag layer (one label per parent, no overlap).
    #[must_use]
    pub fn tag(id: impl Into<String>) -> Self {
        Self::new(id).with_peers(false).with_peers_overlap(false)
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the alignment kind.
    #[must_use]
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set the parent layer.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Allow or forbid multiple siblings.
    #[must_use]
    pub fn with_peers(mut self, peers: bool) -> Self {
        self.peers = peers;
        self
    }

    /// Allow or forbid overlapping siblings.
    #[must_use]
    pub fn with_peers_overlap(mut self, peers_overlap: bool) -> Self {
        self.peers_overlap = peers_overlap;
        self
    }

    /// Require or waive full coverage of the parent.
    #[must_use]
    pub fn with_saturated(mut self, saturated: bool) -> Self {
        self.saturated = saturated;
        self
    }

    /// Require or waive containment in the parent.
    #[must_use]
    pub fn with_parent_includes(mut self, parent_includes: bool) -> Self {
        self.parent_includes = parent_includes;
        self
    }

    /// Set the value type.
    #[must_use]
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Add a permitted label.
    #[must_use]
    pub fn with_valid_label(mut self, label: impl Into<String>, description: impl Into<String>) -> Self {
        self.valid_labels.insert(label.into(), description.into());
        self
    }

    /// True if `label` is allowed (always true for open vocabularies).
    #[must_use]
    pub fn accepts_label(&self, label: &str) -> bool {
        self.valid_labels.is_empty() || self.valid_labels.contains_key(label)
    }
}
