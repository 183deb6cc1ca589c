//! Annotations and the store that indexes them.
//!
//! An [`Annotation`] never holds another entity directly: its anchors and
//! parent are ids resolved through the owning graph. The [`AnnotationStore`]
//! keeps the indices that make those lookups cheap.
//!
//! ```text
//!   by_id      : AnnotationId            -> Annotation
//!   by_layer   : layer id                -> {AnnotationId}
//!   children   : (parent, layer id)      -> [AnnotationId]   ordinal order
//!   starting   : AnchorId                -> {AnnotationId}
//!   ending     : AnchorId                -> {AnnotationId}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::anchor::AnchorId;
use crate::change::ChangeKind;
use crate::confidence::Confidence;

/// Identifier of an [`Annotation`] within one graph (and its fragments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub u64);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e_{}", self.0)
    }
}

/// A labeled span or tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    id: AnnotationId,
    label: String,
    layer_id: String,
    start: AnchorId,
    end: AnchorId,
    /// `None` for annotations attached to the graph root.
    #[serde(default)]
    parent: Option<AnnotationId>,
    ordinal: u32,
    confidence: Confidence,
    #[serde(default, skip_serializing_if = "ChangeKind::is_unchanged")]
    change: ChangeKind,
}

impl Annotation {
    pub(crate) fn new(
        id: AnnotationId,
        layer_id: impl Into<String>,
        label: impl Into<String>,
        start: AnchorId,
        end: AnchorId,
        parent: Option<AnnotationId>,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            layer_id: layer_id.into(),
            start,
            end,
            parent,
            ordinal: 0,
            confidence: Confidence::Default,
            change: ChangeKind::Unchanged,
        }
    }

    /// Annotation id.
    #[must_use]
    pub fn id(&self) -> AnnotationId {
        self.id
    }

    /// Label text.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Layer id.
    #[must_use]
    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    /// Start anchor.
    #[must_use]
    pub fn start(&self) -> AnchorId {
        self.start
    }

    /// End anchor.
    #[must_use]
    pub fn end(&self) -> AnchorId {
        self.end
    }

    /// Parent annotation (`None` when attached to the graph root).
    #[must_use]
    pub fn parent(&self) -> Option<AnnotationId> {
        self.parent
    }

    /// 1-based position among same-layer siblings.
    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Label confidence.
    #[must_use]
    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Lifecycle tag while change tracking is active.
    #[must_use]
    pub fn change(&self) -> ChangeKind {
        self.change
    }

    /// False once destroyed under tracking (still readable until commit).
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.change != ChangeKind::Destroy
    }

    /// True if start and end are the same anchor.
    #[must_use]
    pub fn is_zero_width(&self) -> bool {
        self.start == self.end
    }

    pub(crate) fn set_label_raw(&mut self, label: String) -> String {
        std::mem::replace(&mut self.label, label)
    }

    pub(crate) fn set_confidence_raw(&mut self, confidence: Confidence) -> Confidence {
        std::mem::replace(&mut self.confidence, confidence)
    }

    pub(crate) fn set_change(&mut self, change: ChangeKind) {
        self.change = change;
    }

    /// Only for annotations not yet in a store.
    pub(crate) fn set_parent_raw(&mut self, parent: Option<AnnotationId>) {
        self.parent = parent;
    }

    pub(crate) fn set_ordinal_raw(&mut self, ordinal: u32) {
        self.ordinal = ordinal;
    }
}

/// Key of one sibling list: a parent (or the root) and a layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SiblingKey {
    pub(crate) parent: Option<AnnotationId>,
    pub(crate) layer: String,
}

impl SiblingKey {
    pub(crate) fn of(annotation: &Annotation) -> Self {
        Self {
            parent: annotation.parent,
            layer: annotation.layer_id.clone(),
        }
    }
}

/// Owner of a graph's annotations and their indices.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    by_id: BTreeMap<AnnotationId, Annotation>,
    by_layer: HashMap<String, BTreeSet<AnnotationId>>,
    children: HashMap<SiblingKey, Vec<AnnotationId>>,
    starting: HashMap<AnchorId, BTreeSet<AnnotationId>>,
    ending: HashMap<AnchorId, BTreeSet<AnnotationId>>,
}

impl AnnotationStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of annotations, including ones pending destruction.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True if there are no annotations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Look up an annotation.
    #[must_use]
    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.by_id.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.by_id.get_mut(&id)
    }

    /// True if the annotation exists.
    #[must_use]
    pub fn contains(&self, id: AnnotationId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// All annotations in id (creation) order.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.by_id.values()
    }

    /// Ids on a layer in creation order.
    pub fn on_layer<'a>(&'a self, layer_id: &str) -> impl Iterator<Item = AnnotationId> + 'a {
        self.by_layer
            .get(layer_id)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    /// Children of `parent` on `layer_id`, in ordinal order.
    #[must_use]
    pub fn children(&self, parent: Option<AnnotationId>, layer_id: &str) -> &[AnnotationId] {
        let key = SiblingKey {
            parent,
            layer: layer_id.to_string(),
        };
        self.children.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Annotations whose start is `anchor`.
    pub fn starting_at(&self, anchor: AnchorId) -> impl Iterator<Item = AnnotationId> + '_ {
        self.starting
            .get(&anchor)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    /// Annotations whose end is `anchor`.
    pub fn ending_at(&self, anchor: AnchorId) -> impl Iterator<Item = AnnotationId> + '_ {
        self.ending
            .get(&anchor)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    /// True if any annotation (live or pending destruction) uses `anchor`.
    #[must_use]
    pub fn references(&self, anchor: AnchorId) -> bool {
        self.starting.get(&anchor).map_or(false, |s| !s.is_empty())
            || self.ending.get(&anchor).map_or(false, |s| !s.is_empty())
    }

    /// Highest ordinal among live siblings (0 when none).
    #[must_use]
    pub(crate) fn max_ordinal(&self, key: &SiblingKey) -> u32 {
        self.children
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id))
            .filter(|a| a.is_live())
            .map(Annotation::ordinal)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn insert(&mut self, annotation: Annotation) {
        let id = annotation.id;
        self.by_layer
            .entry(annotation.layer_id.clone())
            .or_default()
            .insert(id);
        self.starting.entry(annotation.start).or_default().insert(id);
        self.ending.entry(annotation.end).or_default().insert(id);
        let key = SiblingKey::of(&annotation);
        self.by_id.insert(id, annotation);
        self.children.entry(key.clone()).or_default().push(id);
        self.sort_siblings(&key);
    }

    pub(crate) fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let annotation = self.by_id.remove(&id)?;
        if let Some(ids) = self.by_layer.get_mut(&annotation.layer_id) {
            ids.remove(&id);
        }
        remove_from(&mut self.starting, annotation.start, id);
        remove_from(&mut self.ending, annotation.end, id);
        let key = SiblingKey::of(&annotation);
        if let Some(siblings) = self.children.get_mut(&key) {
            siblings.retain(|s| *s != id);
            if siblings.is_empty() {
                self.children.remove(&key);
            }
        }
        Some(annotation)
    }

    /// Repoint the start anchor; returns the old one.
    pub(crate) fn relink_start(&mut self, id: AnnotationId, anchor: AnchorId) -> Option<AnchorId> {
        let annotation = self.by_id.get_mut(&id)?;
        let old = std::mem::replace(&mut annotation.start, anchor);
        remove_from(&mut self.starting, old, id);
        self.starting.entry(anchor).or_default().insert(id);
        Some(old)
    }

    /// Repoint the end anchor; returns the old one.
    pub(crate) fn relink_end(&mut self, id: AnnotationId, anchor: AnchorId) -> Option<AnchorId> {
        let annotation = self.by_id.get_mut(&id)?;
        let old = std::mem::replace(&mut annotation.end, anchor);
        remove_from(&mut self.ending, old, id);
        self.ending.entry(anchor).or_default().insert(id);
        Some(old)
    }

    /// Move under a new parent with a new ordinal; returns the old parent.
    pub(crate) fn reparent(
        &mut self,
        id: AnnotationId,
        parent: Option<AnnotationId>,
        ordinal: u32,
    ) -> Option<Option<AnnotationId>> {
        let annotation = self.by_id.get(&id)?;
        let old_key = SiblingKey::of(annotation);
        if let Some(siblings) = self.children.get_mut(&old_key) {
            siblings.retain(|s| *s != id);
            if siblings.is_empty() {
                self.children.remove(&old_key);
            }
        }
        let annotation = self.by_id.get_mut(&id)?;
        let old = std::mem::replace(&mut annotation.parent, parent);
        annotation.ordinal = ordinal;
        let key = SiblingKey::of(annotation);
        self.children.entry(key.clone()).or_default().push(id);
        self.sort_siblings(&key);
        Some(old)
    }

    /// Set an ordinal and keep the sibling list sorted; returns the old one.
    pub(crate) fn reorder(&mut self, id: AnnotationId, ordinal: u32) -> Option<u32> {
        let annotation = self.by_id.get_mut(&id)?;
        let old = std::mem::replace(&mut annotation.ordinal, ordinal);
        let key = SiblingKey::of(annotation);
        self.sort_siblings(&key);
        Some(old)
    }

    fn sort_siblings(&mut self, key: &SiblingKey) {
        let by_id = &self.by_id;
        if let Some(siblings) = self.children.get_mut(key) {
            siblings.sort_by_key(|id| (by_id.get(id).map_or(u32::MAX, |a| a.ordinal), *id));
        }
    }
}

fn remove_from(
    index: &mut HashMap<AnchorId, BTreeSet<AnnotationId>>,
    anchor: AnchorId,
    id: AnnotationId,
) {
    if let Some(ids) = index.get_mut(&anchor) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(&anchor);
        }
    }
}
