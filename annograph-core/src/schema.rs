//! Schema: the layer tree plus conventional role bindings.
//!
//! # Layer Tree
//!
//! ```text
//! transcript (root, interval)
//! ├── participant (tag)                         role: participant
//! │   └── turn (interval)                       role: turn
//! │       ├── utterance (interval)              role: utterance
//! │       └── word (interval)                   role: word
//! │           ├── pos (tag, one per word)
//! │           └── phone (interval, many)
//! └── language (tag)                            transcript attribute
//! ```
//!
//! Passes find layers by structure rather than by hard-coded id, using
//! [`LayerFilter`]s:
//!
//! ```rust
//! use annograph_core::{Alignment, Layer, LayerFilter, Schema};
//!
//! let mut schema = Schema::conventional();
//! schema.add_layer(Layer::tag("pos").with_parent("word")).unwrap();
//! schema.add_layer(Layer::interval("phone").with_parent("word")).unwrap();
//!
//! let tags = schema.find(&LayerFilter::parent("word").and(LayerFilter::alignment(Alignment::None)));
//! assert_eq!(tags.len(), 1);
//! assert_eq!(tags[0].id, "pos");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::layer::{Alignment, Layer};

/// Default id of the root layer.
pub const ROOT_LAYER_ID: &str = "transcript";

/// Conventional structural roles a layer can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Speakers.
    Participant,
    /// Speaker turns.
    Turn,
    /// Utterances (lines) within turns.
    Utterance,
    /// Base word tokens.
    Word,
    /// Recording episode (transcript attribute).
    Episode,
    /// Corpus (transcript attribute).
    Corpus,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Participant => "participant",
            Self::Turn => "turn",
            Self::Utterance => "utterance",
            Self::Word => "word",
            Self::Episode => "episode",
            Self::Corpus => "corpus",
        })
    }
}

/// The layer tree of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "SchemaData", try_from = "SchemaData")]
pub struct Schema {
    root_id: String,
    layers: Vec<Layer>,
    roles: BTreeMap<Role, String>,
}

/// Serialized form; checked on load so the root is always `layers[0]`.
#[derive(Serialize, Deserialize)]
struct SchemaData {
    root_id: String,
    layers: Vec<Layer>,
    #[serde(default)]
    roles: BTreeMap<Role, String>,
}

impl From<Schema> for SchemaData {
    fn from(schema: Schema) -> Self {
        Self {
            root_id: schema.root_id,
            layers: schema.layers,
            roles: schema.roles,
        }
    }
}

impl TryFrom<SchemaData> for Schema {
    type Error = Error;

    fn try_from(data: SchemaData) -> Result<Self> {
        let mut layers = data.layers.into_iter();
        let root = match layers.next() {
            Some(root) if root.id == data.root_id && root.parent_id.is_none() => root,
            Some(first) => {
                return Err(Error::configuration(format!(
                    "schema must list its root layer '{}' first, found '{}'",
                    data.root_id, first.id
                )))
            }
            None => {
                return Err(Error::configuration(format!(
                    "schema has no layers, not even its root '{}'",
                    data.root_id
                )))
            }
        };
        let mut schema = Self {
            root_id: data.root_id,
            layers: vec![root],
            roles: BTreeMap::new(),
        };
        for layer in layers {
            schema.add_layer(layer)?;
        }
        for (role, layer_id) in data.roles {
            schema.set_role(role, layer_id)?;
        }
        Ok(schema)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// Schema containing only the root layer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(ROOT_LAYER_ID)
    }

    /// Schema whose root layer has the given id.
    #[must_use]
    pub fn with_root(root_id: impl Into<String>) -> Self {
        let root_id = root_id.into();
        let root = Layer::interval(root_id.clone())
            .with_description("Transcript")
            .with_peers(false)
            .with_peers_overlap(false)
            .with_parent_includes(false);
        Self {
            root_id,
            layers: vec![root],
            roles: BTreeMap::new(),
        }
    }

    /// Root plus participant / turn / utterance / word, with roles bound.
    #[must_use]
    pub fn conventional() -> Self {
        let mut schema = Self::new();
        let layers = [
            (
                Role::Participant,
                Layer::new("participant")
                    .with_description("Speakers")
                    .with_peers_overlap(true),
            ),
            (
                Role::Turn,
                Layer::interval("turn")
                    .with_description("Speaker turns")
                    .with_parent("participant")
                    .with_peers_overlap(false)
                    .with_saturated(false),
            ),
            (
                Role::Utterance,
                Layer::interval("utterance")
                    .with_description("Lines")
                    .with_parent("turn")
                    .with_peers_overlap(false),
            ),
            (
                Role::Word,
                Layer::interval("word")
                    .with_description("Word tokens")
                    .with_parent("turn")
                    .with_peers_overlap(false)
                    .with_saturated(false),
            ),
        ];
        for (role, layer) in layers {
            let id = layer.id.clone();
            schema.layers.push(if layer.parent_id.is_none() {
                layer.with_parent(ROOT_LAYER_ID)
            } else {
                layer
            });
            schema.roles.insert(role, id);
        }
        schema
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Root layer id.
    #[must_use]
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Root layer.
    #[must_use]
    pub fn root(&self) -> &Layer {
        // the root is inserted by every constructor and cannot be removed
        &self.layers[0]
    }

    /// Layer by id.
    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Layer by id, or an unknown-layer error naming it.
    pub fn require(&self, id: &str) -> Result<&Layer> {
        self.layer(id).ok_or_else(|| Error::unknown_layer(id))
    }

    /// True if a layer with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }

    /// True if `id` is the root layer.
    #[must_use]
    pub fn is_root(&self, id: &str) -> bool {
        self.root_id == id
    }

    /// All layers in definition order, root first.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> + '_ {
        self.layers.iter()
    }

    /// Number of layers including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True if only the root is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.len() <= 1
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Add a layer. A missing parent id means "child of the root".
    ///
    /// The parent may be added later; until then the layer is listed by
    /// [`Schema::unresolved`].
    pub fn add_layer(&mut self, mut layer: Layer) -> Result<&Layer> {
        if layer.id.is_empty() {
            return Err(Error::configuration("layer id must not be empty"));
        }
        if self.contains(&layer.id) {
            return Err(Error::configuration(format!(
                "layer '{}' is already defined",
                layer.id
            )));
        }
        match layer.parent_id.as_deref() {
            None => layer.parent_id = Some(self.root_id.clone()),
            Some(parent) if parent == layer.id => {
                return Err(Error::configuration(format!(
                    "layer '{}' cannot be its own parent",
                    layer.id
                )));
            }
            Some(parent) if !self.contains(parent) => {
                log::debug!("layer '{}' added before its parent '{}'", layer.id, parent);
            }
            Some(_) => {}
        }
        self.layers.push(layer);
        Ok(&self.layers[self.layers.len() - 1])
    }

    /// Remove a childless, non-root layer.
    pub fn remove_layer(&mut self, id: &str) -> Result<Layer> {
        if self.is_root(id) {
            return Err(Error::configuration("the root layer cannot be removed"));
        }
        if let Some(child) = self.children_of(id).first() {
            return Err(Error::configuration(format!(
                "layer '{}' still has child layer '{}'",
                id, child.id
            )));
        }
        let index = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| Error::unknown_layer(id))?;
        self.roles.retain(|_, layer_id| layer_id != id);
        Ok(self.layers.remove(index))
    }

    /// Bind a role to an existing layer.
    pub fn set_role(&mut self, role: Role, layer_id: impl Into<String>) -> Result<()> {
        let layer_id = layer_id.into();
        self.require(&layer_id)?;
        self.roles.insert(role, layer_id);
        Ok(())
    }

    /// Copy role bindings from another schema, for layers that exist here.
    pub fn copy_layer_ids_from(&mut self, other: &Schema) {
        for (role, id) in &other.roles {
            if self.contains(id) {
                self.roles.insert(*role, id.clone());
            }
        }
    }

    // =========================================================================
    // Roles
    // =========================================================================

    /// Layer bound to a role.
    #[must_use]
    pub fn role(&self, role: Role) -> Option<&Layer> {
        self.roles.get(&role).and_then(|id| self.layer(id))
    }

    /// Id bound to a role.
    #[must_use]
    pub fn role_id(&self, role: Role) -> Option<&str> {
        self.roles.get(&role).map(String::as_str)
    }

    /// Participant layer.
    #[must_use]
    pub fn participant_layer(&self) -> Option<&Layer> {
        self.role(Role::Participant)
    }

    /// Turn layer.
    #[must_use]
    pub fn turn_layer(&self) -> Option<&Layer> {
        self.role(Role::Turn)
    }

    /// Utterance layer.
    #[must_use]
    pub fn utterance_layer(&self) -> Option<&Layer> {
        self.role(Role::Utterance)
    }

    /// Word token layer.
    #[must_use]
    pub fn word_layer(&self) -> Option<&Layer> {
        self.role(Role::Word)
    }

    // =========================================================================
    // Tree structure
    // =========================================================================

    /// Parent layer of `id`, if defined.
    #[must_use]
    pub fn parent(&self, id: &str) -> Option<&Layer> {
        self.layer(id)?
            .parent_id
            .as_deref()
            .and_then(|p| self.layer(p))
    }

    /// Direct child layers in definition order.
    #[must_use]
    pub fn children_of(&self, id: &str) -> Vec<&Layer> {
        self.layers
            .iter()
            .filter(|l| l.parent_id.as_deref() == Some(id))
            .collect()
    }

    /// Ancestors of `id`, nearest first, ending at the root.
    #[must_use]
    pub fn ancestors(&self, id: &str) -> Vec<&Layer> {
        let mut out = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = self.parent(id);
        while let Some(layer) = current {
            if !seen.insert(layer.id.as_str()) {
                break;
            }
            out.push(layer);
            current = self.parent(&layer.id);
        }
        out
    }

    /// True if `ancestor` is a strict ancestor of `id`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: &str, id: &str) -> bool {
        self.ancestors(id).iter().any(|l| l.id == ancestor)
    }

    /// True if `descendant` is a strict descendant of `id`.
    #[must_use]
    pub fn is_descendant(&self, descendant: &str, id: &str) -> bool {
        self.is_ancestor(id, descendant)
    }

    /// Deepest layer that is an ancestor of (or equal to) both.
    #[must_use]
    pub fn first_common_ancestor(&self, a: &str, b: &str) -> Option<&Layer> {
        let mut a_line: Vec<&Layer> = self.layer(a).into_iter().collect();
        a_line.extend(self.ancestors(a));
        let mut b_line: HashSet<&str> = self.ancestors(b).iter().map(|l| l.id.as_str()).collect();
        b_line.insert(b);
        a_line.into_iter().find(|l| b_line.contains(l.id.as_str()))
    }

    /// Distance from the root (root = 0).
    #[must_use]
    pub fn depth(&self, id: &str) -> Option<usize> {
        self.layer(id).map(|_| self.ancestors(id).len())
    }

    /// All layers in depth-first pre-order from the root.
    #[must_use]
    pub fn top_down(&self) -> Vec<&Layer> {
        let mut out = Vec::with_capacity(self.layers.len());
        let mut stack = vec![self.root()];
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(layer) = stack.pop() {
            if !seen.insert(layer.id.as_str()) {
                continue;
            }
            out.push(layer);
            let children = self.children_of(&layer.id);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Layers whose parent is not (yet) defined.
    #[must_use]
    pub fn unresolved(&self) -> Vec<&Layer> {
        self.layers
            .iter()
            .skip(1)
            .filter(|l| l.parent_id.as_deref().map_or(true, |p| !self.contains(p)))
            .collect()
    }

    /// Error naming the first layer whose parent is missing.
    pub fn check_complete(&self) -> Result<()> {
        match self.unresolved().first() {
            Some(layer) => Err(Error::configuration(format!(
                "layer '{}' refers to undefined parent '{}'",
                layer.id,
                layer.parent_id.as_deref().unwrap_or("")
            ))),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Layers matching `filter`, in top-down order.
    #[must_use]
    pub fn find(&self, filter: &LayerFilter) -> Vec<&Layer> {
        self.top_down()
            .into_iter()
            .filter(|l| filter.matches(l, self))
            .collect()
    }

    /// First layer matching `filter` in top-down order.
    #[must_use]
    pub fn find_first(&self, filter: &LayerFilter) -> Option<&Layer> {
        self.top_down()
            .into_iter()
            .find(|l| filter.matches(l, self))
    }

    /// Layers matching an arbitrary test, in top-down order.
    pub fn find_by<F>(&self, test: F) -> Vec<&Layer>
    where
        F: Fn(&Layer, &Schema) -> bool,
    {
        self.top_down()
            .into_iter()
            .filter(|l| test(l, self))
            .collect()
    }
}

// =============================================================================
// Filters
// =============================================================================

type LayerTest = dyn Fn(&Layer, &Schema) -> bool + Send + Sync;

/// Composable structural predicate over layers.
#[derive(Clone)]
pub enum LayerFilter {
    /// Every layer.
    Any,
    /// Direct children of the named layer.
    Parent(String),
    /// Strict descendants of the named layer.
    DescendantOf(String),
    /// Layers with this alignment.
    Alignment(Alignment),
    /// Layers whose id matches a regular expression.
    IdPattern(Regex),
    /// Layers whose id contains a substring.
    IdContains(String),
    /// Layers bound to a role.
    Role(Role),
    /// All filters match.
    And(Vec<LayerFilter>),
    /// Any filter matches.
    Or(Vec<LayerFilter>),
    /// Filter does not match.
    Not(Box<LayerFilter>),
    /// Arbitrary test.
    Custom(Arc<LayerTest>),
}

impl fmt::Debug for LayerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Parent(p) => f.debug_tuple("Parent").field(p).finish(),
            Self::DescendantOf(p) => f.debug_tuple("DescendantOf").field(p).finish(),
            Self::Alignment(a) => f.debug_tuple("Alignment").field(a).finish(),
            Self::IdPattern(r) => f.debug_tuple("IdPattern").field(&r.as_str()).finish(),
            Self::IdContains(s) => f.debug_tuple("IdContains").field(s).finish(),
            Self::Role(r) => f.debug_tuple("Role").field(r).finish(),
            Self::And(v) => f.debug_tuple("And").field(v).finish(),
            Self::Or(v) => f.debug_tuple("Or").field(v).finish(),
            Self::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl LayerFilter {
    /// Children of `parent_id`.
    #[must_use]
    pub fn parent(parent_id: impl Into<String>) -> Self {
        Self::Parent(parent_id.into())
    }

    /// Strict descendants of `ancestor_id`.
    #[must_use]
    pub fn descendant_of(ancestor_id: impl Into<String>) -> Self {
        Self::DescendantOf(ancestor_id.into())
    }

    /// Layers with the given alignment.
    #[must_use]
    pub fn alignment(alignment: Alignment) -> Self {
        Self::Alignment(alignment)
    }

    /// Layers whose id matches `pattern` anywhere.
    ///
    /// A malformed pattern is a configuration error.
    pub fn id_pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::IdPattern)
            .map_err(|e| Error::configuration(format!("invalid layer id pattern '{pattern}': {e}")))
    }

    /// Layers whose id contains `needle`.
    #[must_use]
    pub fn id_contains(needle: impl Into<String>) -> Self {
        Self::IdContains(needle.into())
    }

    /// Layers bound to `role`.
    #[must_use]
    pub fn role(role: Role) -> Self {
        Self::Role(role)
    }

    /// Arbitrary test.
    #[must_use]
    pub fn custom<F>(test: F) -> Self
    where
        F: Fn(&Layer, &Schema) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(test))
    }

    /// Both this and `other`.
    #[must_use]
    pub fn and(self, other: LayerFilter) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Either this or `other`.
    #[must_use]
    pub fn or(self, other: LayerFilter) -> Self {
        match self {
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Negation.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluate against one layer.
    #[must_use]
    pub fn matches(&self, layer: &Layer, schema: &Schema) -> bool {
        match self {
            Self::Any => true,
            Self::Parent(p) => layer.parent_id.as_deref() == Some(p.as_str()),
            Self::DescendantOf(a) => schema.is_ancestor(a, &layer.id),
            Self::Alignment(a) => layer.alignment == *a,
            Self::IdPattern(r) => r.is_match(&layer.id),
            Self::IdContains(s) => layer.id.contains(s.as_str()),
            Self::Role(r) => schema.role_id(*r) == Some(layer.id.as_str()),
            Self::And(all) => all.iter().all(|f| f.matches(layer, schema)),
            Self::Or(any) => any.iter().any(|f| f.matches(layer, schema)),
            Self::Not(inner) => !inner.matches(layer, schema),
            Self::Custom(test) => test(layer, schema),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        let mut s = Schema::conventional();
        s.add_layer(Layer::tag("pos").with_parent("word")).unwrap();
        s.add_layer(Layer::interval("phone").with_parent("word")).unwrap();
        s.add_layer(Layer::tag("language")).unwrap();
        s.add_layer(Layer::tag("language_de").with_parent("utterance"))
            .unwrap();
        s
    }

    #[test]
    fn conventional_roles() {
        let s = Schema::conventional();
        assert_eq!(s.word_layer().unwrap().id, "word");
        assert_eq!(s.turn_layer().unwrap().parent_id.as_deref(), Some("participant"));
        assert_eq!(s.participant_layer().unwrap().parent_id.as_deref(), Some(ROOT_LAYER_ID));
        assert!(s.role(Role::Episode).is_none());
    }

    #[test]
    fn add_defaults_parent_to_root() {
        let s = schema();
        assert_eq!(s.layer("language").unwrap().parent_id.as_deref(), Some(ROOT_LAYER_ID));
    }

    #[test]
    fn duplicate_layer_rejected() {
        let mut s = schema();
        let err = s.add_layer(Layer::new("pos")).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn json_keeps_layers_and_roles() {
        let s = schema();
        let back: Schema = serde_json::from_str(&serde_json::to_string(&s).unwrap()).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn rootless_json_rejected() {
        for bad in [
            r#"{"root_id":"transcript","layers":[]}"#,
            r#"{"root_id":"transcript","layers":[{"id":"word","alignment":"interval"}]}"#,
        ] {
            let err = serde_json::from_str::<Schema>(bad).unwrap_err();
            assert!(err.to_string().contains("transcript"), "{err}");
        }
    }

    #[test]
    fn duplicate_layer_in_json_rejected() {
        let mut value = serde_json::to_value(schema()).unwrap();
        let word = value["layers"][4].clone();
        value["layers"].as_array_mut().unwrap().push(word);
        assert!(serde_json::from_value::<Schema>(value).is_err());
    }

    #[test]
    fn pending_parent_resolves_later() {
        let mut s = Schema::new();
        s.add_layer(Layer::interval("segment").with_parent("line")).unwrap();
        assert_eq!(s.unresolved().len(), 1);
        assert!(s.check_complete().is_err());
        s.add_layer(Layer::interval("line")).unwrap();
        assert!(s.unresolved().is_empty());
        assert!(s.is_ancestor("line", "segment"));
    }

    #[test]
    fn ancestry() {
        let s = schema();
        let ids: Vec<&str> = s.ancestors("phone").iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["word", "turn", "participant", ROOT_LAYER_ID]);
        assert!(s.is_descendant("pos", "turn"));
        assert!(!s.is_ancestor("utterance", "word"));
        assert_eq!(s.depth("word"), Some(3));
    }

    #[test]
    fn common_ancestor() {
        let s = schema();
        assert_eq!(s.first_common_ancestor("pos", "utterance").unwrap().id, "turn");
        assert_eq!(s.first_common_ancestor("phone", "word").unwrap().id, "word");
        assert_eq!(s.first_common_ancestor("language", "word").unwrap().id, ROOT_LAYER_ID);
    }

    #[test]
    fn top_down_is_preorder() {
        let s = schema();
        let ids: Vec<&str> = s.top_down().iter().map(|l| l.id.as_str()).collect();
        let pos = |id| ids.iter().position(|x| *x == id).unwrap();
        assert_eq!(ids[0], ROOT_LAYER_ID);
        assert!(pos("turn") < pos("utterance"));
        assert!(pos("word") < pos("pos"));
        assert!(pos("pos") < pos("language"));
    }

    #[test]
    fn composable_filters() {
        let s = schema();
        let unaligned_under_word =
            LayerFilter::parent("word").and(LayerFilter::alignment(Alignment::None));
        let found: Vec<&str> = s.find(&unaligned_under_word).iter().map(|l| l.id.as_str()).collect();
        assert_eq!(found, vec!["pos"]);

        let language = LayerFilter::id_pattern("^language_[a-z]{2}$").unwrap();
        assert_eq!(s.find_first(&language).unwrap().id, "language_de");

        let not_aligned = LayerFilter::alignment(Alignment::Interval).negate();
        assert!(s.find(&not_aligned).iter().all(|l| l.alignment != Alignment::Interval));

        let custom = LayerFilter::custom(|l, s| s.is_descendant(&l.id, "word") && !l.peers);
        assert_eq!(s.find(&custom).len(), 1);
    }

    #[test]
    fn malformed_pattern_is_configuration_error() {
        let err = LayerFilter::id_pattern("([unclosed").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn remove_leaf_only() {
        let mut s = schema();
        assert!(s.remove_layer("word").is_err());
        assert!(s.remove_layer(ROOT_LAYER_ID).is_err());
        s.remove_layer("pos").unwrap();
        assert!(!s.contains("pos"));
    }

    #[test]
    fn copy_roles() {
        let mut s = Schema::new();
        s.add_layer(Layer::interval("word")).unwrap();
        s.copy_layer_ids_from(&Schema::conventional());
        assert_eq!(s.word_layer().unwrap().id, "word");
        assert!(s.turn_layer().is_none());
    }
}
