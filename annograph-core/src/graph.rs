//! The annotation graph: aggregate root owning anchors, annotations and
//! the schema, and the only place they can be created or destroyed.
//!
//! # Ownership
//!
//! ```text
//!   Graph
//!   ├── Schema          layer tree + roles
//!   ├── AnchorStore     AnchorId -> Anchor, offset index
//!   ├── AnnotationStore AnnotationId -> Annotation, layer/parent/anchor indices
//!   └── ChangeTracker?  present while tracking
//! ```
//!
//! Anchors and annotations refer to each other only by id, so an anchor can
//! be shared by any number of annotations, and destroying an annotation
//! never dangles anything: its anchors stay put for whoever else uses them.
//!
//! # Rule enforcement
//!
//! [`Graph::create_annotation`] consults the layer before inserting:
//!
//! | Rule               | Rejected when                                         |
//! |--------------------|-------------------------------------------------------|
//! | alignment          | a tag/instant annotation has `start != end`           |
//! | ordering           | both offsets known and `start > end`                  |
//! | parent layer       | parent is not on the layer's parent layer             |
//! | `peers = false`    | a live sibling already exists                         |
//! | `peers_overlap`    | spans strictly overlap (sharing a boundary is fine)   |
//! | `parent_includes`  | the span leaves an interval parent's span             |
//!
//! Later edits (moving anchors, extending parents) are not re-validated;
//! `annograph::validator` reports any drift.
//!
//! # Ordinals
//!
//! A new annotation gets `1 + the highest ordinal among its live siblings`, so
//! the n-th child created under a parent has ordinal n. Destroying a
//! sibling leaves a gap; [`Graph::renumber_ordinals`] compacts on demand.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::anchor::{check_offset, quantize, Anchor, AnchorId, AnchorStore};
use crate::annotation::{Annotation, AnnotationId, AnnotationStore, SiblingKey};
use crate::change::{Attribute, Change, ChangeKind, ChangeTracker, EntityRef, Value};
use crate::confidence::Confidence;
use crate::config::GraphConfig;
use crate::error::{Error, Result};
use crate::fragment::FragmentSource;
use crate::layer::Alignment;
use crate::media::MediaProvider;
use crate::query::AnnotationRef;
use crate::schema::Schema;

/// Counts reported by [`Graph::commit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    /// Entities created since tracking started.
    pub created: usize,
    /// Pre-existing entities with changed attributes.
    pub updated: usize,
    /// Entities removed by this commit.
    pub destroyed: usize,
}

/// A temporally anchored, multi-tier annotation graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "GraphData", try_from = "GraphData")]
pub struct Graph {
    id: String,
    pub(crate) corpus: Option<String>,
    schema: Schema,
    pub(crate) config: GraphConfig,
    pub(crate) anchors: AnchorStore,
    pub(crate) annotations: AnnotationStore,
    tracker: Option<ChangeTracker>,
    pub(crate) source: Option<FragmentSource>,
    pub(crate) media: Option<Arc<dyn MediaProvider>>,
    pub(crate) next_id: u64,
}

impl Graph {
    /// Empty graph with the given id and schema.
    #[must_use]
    pub fn new(id: impl Into<String>, schema: Schema) -> Self {
        Self {
            id: id.into(),
            corpus: None,
            schema,
            config: GraphConfig::default(),
            anchors: AnchorStore::new(None),
            annotations: AnnotationStore::new(),
            tracker: None,
            source: None,
            media: None,
            next_id: 1,
        }
    }

    /// Set the corpus name.
    #[must_use]
    pub fn with_corpus(mut self, corpus: impl Into<String>) -> Self {
        self.corpus = Some(corpus.into());
        self
    }

    // =========================================================================
    // Identity and settings
    // =========================================================================

    /// Graph id (the transcript name, or a fragment id).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rename the graph.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Corpus the transcript belongs to.
    #[must_use]
    pub fn corpus(&self) -> Option<&str> {
        self.corpus.as_deref()
    }

    /// Layer tree.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Mutable layer tree, for adding layers derived by a pass.
    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    /// Offset settings.
    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Replace the offset settings; anchors are re-indexed, not moved.
    pub fn set_config(&mut self, config: GraphConfig) -> Result<()> {
        config.validate()?;
        self.anchors.set_granularity(config.offset_granularity);
        self.config = config;
        Ok(())
    }

    /// Source graph reference, for fragments.
    #[must_use]
    pub fn source(&self) -> Option<&FragmentSource> {
        self.source.as_ref()
    }

    /// True if this graph was extracted from another.
    #[must_use]
    pub fn is_fragment(&self) -> bool {
        self.source.is_some()
    }

    /// Attached media provider.
    #[must_use]
    pub fn media_provider(&self) -> Option<&Arc<dyn MediaProvider>> {
        self.media.as_ref()
    }

    /// Attach a media provider.
    pub fn set_media_provider(&mut self, provider: Arc<dyn MediaProvider>) {
        self.media = Some(provider);
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Anchor store (read-only).
    #[must_use]
    pub fn anchors(&self) -> &AnchorStore {
        &self.anchors
    }

    /// Annotation store (read-only).
    #[must_use]
    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    /// Anchor by id, including ones pending destruction.
    #[must_use]
    pub fn anchor(&self, id: AnchorId) -> Option<&Anchor> {
        self.anchors.get(id)
    }

    /// Offset of an anchor, if set.
    #[must_use]
    pub fn offset(&self, id: AnchorId) -> Option<f64> {
        self.anchors.get(id).and_then(Anchor::offset)
    }

    /// Annotation by id, including ones pending destruction.
    #[must_use]
    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    /// Navigable view of an annotation.
    #[must_use]
    pub fn annotation(&self, id: AnnotationId) -> Option<AnnotationRef<'_>> {
        self.annotations
            .get(id)
            .map(|annotation| AnnotationRef::new(self, annotation))
    }

    /// Live annotation, or an unknown-annotation error.
    pub fn require(&self, id: AnnotationId) -> Result<&Annotation> {
        self.annotations
            .get(id)
            .filter(|a| a.is_live())
            .ok_or(Error::UnknownAnnotation(id))
    }

    fn require_anchor(&self, id: AnchorId) -> Result<&Anchor> {
        self.anchors
            .get(id)
            .filter(|a| a.is_live())
            .ok_or(Error::UnknownAnchor(id))
    }

    /// Live siblings of `key` (same parent, same layer), in ordinal order.
    pub(crate) fn live_siblings<'a>(
        &'a self,
        parent: Option<AnnotationId>,
        layer_id: &str,
    ) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.annotations
            .children(parent, layer_id)
            .iter()
            .filter_map(move |id| self.annotations.get(*id))
            .filter(|a| a.is_live())
    }

    // =========================================================================
    // Anchors
    // =========================================================================

    /// Anchor at `offset`, creating it if none exists.
    ///
    /// An existing anchor keeps its offset; its confidence is raised to
    /// `confidence` if that is higher, never lowered.
    pub fn get_or_create_anchor_at(&mut self, offset: f64, confidence: Confidence) -> Result<AnchorId> {
        let offset = check_offset(offset)?;
        if let Some(id) = self.anchors.at(offset) {
            if let Some(old) = self.anchors.upgrade_confidence(id, confidence) {
                log::debug!("anchor {id} at {offset}: confidence {old} -> {confidence}");
                self.note_update(EntityRef::Anchor(id), Attribute::Confidence, Value::Confidence(old));
            }
            return Ok(id);
        }
        self.create_anchor(Some(offset), confidence)
    }

    /// Existing live anchor at exactly `offset`.
    #[must_use]
    pub fn anchor_at(&self, offset: f64) -> Option<AnchorId> {
        self.anchors.at(offset)
    }

    /// New anchor, even if one already exists at `offset`.
    pub fn create_anchor(&mut self, offset: Option<f64>, confidence: Confidence) -> Result<AnchorId> {
        let offset = match offset {
            Some(o) => Some(quantize(check_offset(o)?, self.anchors.granularity())),
            None => None,
        };
        let id = AnchorId(self.allocate());
        self.anchors.insert(Anchor::new(id, offset, confidence));
        self.note_created(EntityRef::Anchor(id));
        Ok(id)
    }

    /// Move an anchor if `confidence` is at least its current confidence.
    ///
    /// An anchor with no offset yet takes one at any confidence. Returns
    /// `false` (and changes nothing) for a weaker proposal.
    pub fn set_anchor_offset(
        &mut self,
        id: AnchorId,
        offset: Option<f64>,
        confidence: Confidence,
    ) -> Result<bool> {
        let anchor = self.require_anchor(id)?;
        let current = anchor.confidence();
        if anchor.offset().is_some() && !confidence.may_overwrite(current) {
            log::debug!("anchor {id}: ignoring {confidence} offset over {current}");
            return Ok(false);
        }
        let (old_offset, old_confidence) = self.anchors.write(id, offset, confidence)?;
        if self.offset(id) != old_offset {
            self.note_update(EntityRef::Anchor(id), Attribute::Offset, Value::Offset(old_offset));
        }
        if confidence != old_confidence {
            self.note_update(
                EntityRef::Anchor(id),
                Attribute::Confidence,
                Value::Confidence(old_confidence),
            );
        }
        Ok(true)
    }

    /// Add `delta` to every set offset, keeping confidences.
    pub fn shift_anchors(&mut self, delta: f64) -> Result<()> {
        check_offset(delta)?;
        let moves: Vec<(AnchorId, f64, Confidence)> = self
            .anchors
            .iter()
            .filter(|a| a.is_live())
            .filter_map(|a| a.offset().map(|o| (a.id(), o, a.confidence())))
            .collect();
        for (id, offset, confidence) in moves {
            self.anchors.write(id, Some(offset + delta), confidence)?;
            self.note_update(EntityRef::Anchor(id), Attribute::Offset, Value::Offset(Some(offset)));
        }
        Ok(())
    }

    /// Destroy an anchor that no live annotation uses.
    pub fn destroy_anchor(&mut self, id: AnchorId) -> Result<()> {
        self.require_anchor(id)?;
        let in_use = self
            .annotations
            .starting_at(id)
            .chain(self.annotations.ending_at(id))
            .filter_map(|a| self.annotations.get(a))
            .any(Annotation::is_live);
        if in_use {
            return Err(Error::AnchorInUse(id));
        }
        if self.tracker.is_some() {
            self.note_destroyed(EntityRef::Anchor(id));
        } else {
            self.anchors.remove(id);
        }
        Ok(())
    }

    /// Lower bound of an anchor's offset: its own offset, or the latest known
    /// start of annotations ending at it.
    #[must_use]
    pub fn offset_min(&self, id: AnchorId) -> Option<f64> {
        self.bound(id, true, &mut HashSet::new())
    }

    /// Upper bound of an anchor's offset: its own offset, or the earliest known
    /// end of annotations starting at it.
    #[must_use]
    pub fn offset_max(&self, id: AnchorId) -> Option<f64> {
        self.bound(id, false, &mut HashSet::new())
    }

    fn bound(&self, id: AnchorId, lower: bool, seen: &mut HashSet<AnchorId>) -> Option<f64> {
        let anchor = self.anchors.get(id)?;
        if let Some(offset) = anchor.offset() {
            return Some(offset);
        }
        if !seen.insert(id) {
            return None;
        }
        let neighbours: Vec<AnchorId> = if lower {
            self.annotations
                .ending_at(id)
                .filter_map(|a| self.annotations.get(a))
                .filter(|a| a.is_live() && a.start() != id)
                .map(Annotation::start)
                .collect()
        } else {
            self.annotations
                .starting_at(id)
                .filter_map(|a| self.annotations.get(a))
                .filter(|a| a.is_live() && a.end() != id)
                .map(Annotation::end)
                .collect()
        };
        let found = neighbours
            .into_iter()
            .filter_map(|n| self.bound(n, lower, seen));
        if lower {
            found.fold(None, |acc: Option<f64>, o| Some(acc.map_or(o, |a| a.max(o))))
        } else {
            found.fold(None, |acc: Option<f64>, o| Some(acc.map_or(o, |a| a.min(o))))
        }
    }

    // =========================================================================
    // Annotation factories
    // =========================================================================

    /// Create an annotation after checking the layer's rules.
    ///
    /// `parent` is `None` for layers whose parent is the root. In fragments
    /// it may also be `None` when the real parent lies outside the fragment.
    pub fn create_annotation(
        &mut self,
        layer_id: &str,
        label: impl Into<String>,
        start: AnchorId,
        end: AnchorId,
        parent: Option<AnnotationId>,
    ) -> Result<AnnotationId> {
        let label = label.into();
        self.check_new(layer_id, &label, start, end, parent)?;
        Ok(self.insert_new(layer_id, label, start, end, parent, None))
    }

    /// Create an annotation from `from`'s start to `to`'s end.
    pub fn create_span(
        &mut self,
        from: AnnotationId,
        to: AnnotationId,
        layer_id: &str,
        label: impl Into<String>,
        parent: Option<AnnotationId>,
    ) -> Result<AnnotationId> {
        let start = self.require(from)?.start();
        let end = self.require(to)?.end();
        self.create_annotation(layer_id, label, start, end, parent)
    }

    /// Tag `target` with a zero-width annotation on `layer_id`.
    ///
    /// The tag uses the target's start anchor for both ends, so no anchors
    /// are added. The tag layer must be a child or a peer of the target's
    /// layer (or a child of the root).
    pub fn create_tag(
        &mut self,
        target: AnnotationId,
        layer_id: &str,
        label: impl Into<String>,
    ) -> Result<AnnotationId> {
        let target = self.require(target)?;
        let (target_id, target_layer, target_parent, anchor) = (
            target.id(),
            target.layer_id().to_string(),
            target.parent(),
            target.start(),
        );
        let layer = self.schema.require(layer_id)?;
        if layer.alignment == Alignment::Interval {
            return Err(Error::configuration(format!(
                "layer '{layer_id}' is an interval layer; tags need a zero-width layer"
            )));
        }
        let tag_parent_layer = layer.parent_id.as_deref();
        let parent = if tag_parent_layer == Some(target_layer.as_str()) {
            Some(target_id)
        } else if tag_parent_layer == self.schema.layer(&target_layer).and_then(|l| l.parent_id.as_deref()) {
            target_parent
        } else if tag_parent_layer.map_or(true, |p| self.schema.is_root(p)) {
            None
        } else {
            return Err(Error::configuration(format!(
                "layer '{layer_id}' cannot tag annotations on layer '{target_layer}'"
            )));
        };
        self.create_annotation(layer_id, label, anchor, anchor, parent)
    }

    /// Append the next piece of `token`'s label on `layer_id`.
    ///
    /// Successive calls partition the token's label: each `label` must be a
    /// prefix of what earlier calls have not yet consumed. The first piece
    /// spans the whole token; later pieces split the previous one at a new
    /// unset anchor.
    pub fn create_subdivision(
        &mut self,
        token: AnnotationId,
        layer_id: &str,
        label: &str,
    ) -> Result<AnnotationId> {
        let token = self.require(token)?.clone();
        let layer = self.schema.require(layer_id)?;
        if layer.alignment != Alignment::Interval {
            return Err(Error::configuration(format!(
                "subdivision layer '{layer_id}' must be an interval layer"
            )));
        }
        let dest_parent_layer = layer.parent_id.clone();
        let parent = if dest_parent_layer.as_deref() == Some(token.layer_id()) {
            Some(token.id())
        } else if dest_parent_layer.as_deref()
            == self.schema.layer(token.layer_id()).and_then(|l| l.parent_id.as_deref())
        {
            token.parent()
        } else {
            return Err(Error::configuration(format!(
                "layer '{layer_id}' can be neither a child nor a peer of layer '{}'",
                token.layer_id()
            )));
        };

        let (consumed, last) = self.subdivisions_of(&token, layer_id, parent);
        let context = || {
            format!(
                "token {} '{}' [{}-{}]",
                token.id(),
                token.label(),
                fmt_offset(self.offset(token.start())),
                fmt_offset(self.offset(token.end()))
            )
        };
        let remaining = token.label().strip_prefix(consumed.as_str()).ok_or_else(|| {
            Error::transformation(format!(
                "{}: existing pieces '{consumed}' are not a prefix of the label",
                context()
            ))
        })?;
        if remaining.is_empty() {
            return Err(Error::transformation(format!(
                "{}: label already fully consumed, cannot add '{label}'",
                context()
            )));
        }
        if label.is_empty() || !remaining.starts_with(label) {
            return Err(Error::transformation(format!(
                "{}: '{label}' does not start the unconsumed remainder '{remaining}'",
                context()
            )));
        }
        match last {
            None => self.create_annotation(layer_id, label, token.start(), token.end(), parent),
            Some(previous) => self.insert_after(previous, label),
        }
    }

    /// Existing pieces of `token` on `layer_id`: concatenated labels and the last piece.
    fn subdivisions_of(
        &self,
        token: &Annotation,
        layer_id: &str,
        parent: Option<AnnotationId>,
    ) -> (String, Option<AnnotationId>) {
        let mut consumed = String::new();
        let mut last = None;
        let mut cursor = token.start();
        let mut seen = HashSet::new();
        while cursor != token.end() && seen.insert(cursor) {
            let next = self
                .annotations
                .starting_at(cursor)
                .filter_map(|id| self.annotations.get(id))
                .find(|a| {
                    a.is_live()
                        && a.layer_id() == layer_id
                        && a.parent() == parent
                        && !a.is_zero_width()
                });
            match next {
                Some(piece) => {
                    consumed.push_str(piece.label());
                    last = Some(piece.id());
                    cursor = piece.end();
                }
                None => break,
            }
        }
        (consumed, last)
    }

    /// Insert a sibling right after `before`, splitting its end boundary.
    ///
    /// `before` is cut at a new unset anchor, the new annotation runs from
    /// there to `before`'s old end, and later siblings shift up one ordinal.
    pub fn insert_after(&mut self, before: AnnotationId, label: impl Into<String>) -> Result<AnnotationId> {
        let before = self.require(before)?.clone();
        self.check_splittable(&before)?;
        let old_end = before.end();
        let anchor = self.create_anchor(None, Confidence::None)?;
        self.set_end(before.id(), anchor)?;
        let ordinal = before.ordinal() + 1;
        self.shift_ordinals(before.parent(), before.layer_id(), ordinal)?;
        Ok(self.insert_new(
            before.layer_id(),
            label.into(),
            anchor,
            old_end,
            before.parent(),
            Some(ordinal),
        ))
    }

    /// Insert a sibling right before `after`, splitting its start boundary.
    pub fn insert_before(&mut self, after: AnnotationId, label: impl Into<String>) -> Result<AnnotationId> {
        let after = self.require(after)?.clone();
        self.check_splittable(&after)?;
        let old_start = after.start();
        let anchor = self.create_anchor(None, Confidence::None)?;
        self.set_start(after.id(), anchor)?;
        let ordinal = after.ordinal();
        self.shift_ordinals(after.parent(), after.layer_id(), ordinal)?;
        Ok(self.insert_new(
            after.layer_id(),
            label.into(),
            old_start,
            anchor,
            after.parent(),
            Some(ordinal),
        ))
    }

    fn check_splittable(&self, annotation: &Annotation) -> Result<()> {
        let layer = self.schema.require(annotation.layer_id())?;
        if !layer.peers {
            return Err(Error::rule(
                &layer.id,
                "cannot insert a sibling on a layer without peers",
            ));
        }
        if layer.alignment.is_zero_width() {
            return Err(Error::rule(&layer.id, "cannot split a zero-width annotation"));
        }
        Ok(())
    }

    fn shift_ordinals(&mut self, parent: Option<AnnotationId>, layer_id: &str, from: u32) -> Result<()> {
        let to_shift: Vec<(AnnotationId, u32)> = self
            .annotations
            .children(parent, layer_id)
            .iter()
            .filter_map(|id| self.annotations.get(*id))
            .filter(|a| a.ordinal() >= from)
            .map(|a| (a.id(), a.ordinal()))
            .collect();
        for (id, ordinal) in to_shift.into_iter().rev() {
            self.set_ordinal(id, ordinal + 1)?;
        }
        Ok(())
    }

    fn check_new(
        &self,
        layer_id: &str,
        label: &str,
        start: AnchorId,
        end: AnchorId,
        parent: Option<AnnotationId>,
    ) -> Result<()> {
        if self.schema.is_root(layer_id) {
            return Err(Error::rule(layer_id, "the root layer is the graph itself"));
        }
        let layer = self.schema.require(layer_id)?;
        let s = self.require_anchor(start)?.offset();
        let e = self.require_anchor(end)?.offset();

        if layer.alignment.is_zero_width() && start != end {
            return Err(Error::rule(
                layer_id,
                format!("{} annotations must start and end at the same anchor", layer.alignment),
            ));
        }
        if let (Some(s), Some(e)) = (s, e) {
            if s > e {
                return Err(Error::rule(layer_id, format!("start {s} is after end {e}")));
            }
        }
        if !layer.accepts_label(label) {
            return Err(Error::rule(layer_id, format!("'{label}' is not a valid label")));
        }

        let parent_layer = layer.parent_id.as_deref().unwrap_or(self.schema.root_id());
        match parent {
            None if !self.schema.is_root(parent_layer) && !self.is_fragment() => {
                return Err(Error::rule(
                    layer_id,
                    format!("annotations need a parent on layer '{parent_layer}'"),
                ));
            }
            None => {}
            Some(p) => {
                let parent_annotation = self.require(p)?;
                if parent_annotation.layer_id() != parent_layer {
                    return Err(Error::rule(
                        layer_id,
                        format!(
                            "parent {p} is on layer '{}', expected '{parent_layer}'",
                            parent_annotation.layer_id()
                        ),
                    ));
                }
            }
        }

        if !layer.peers && self.live_siblings(parent, layer_id).next().is_some() {
            return Err(Error::rule(
                layer_id,
                format!(
                    "only one annotation per parent is allowed (parent {})",
                    parent.map_or_else(|| "root".to_string(), |p| p.to_string())
                ),
            ));
        }

        if !layer.peers_overlap {
            if let (Some(s), Some(e)) = (s, e) {
                for sibling in self.live_siblings(parent, layer_id) {
                    let (Some(ss), Some(se)) = (self.offset(sibling.start()), self.offset(sibling.end())) else {
                        continue;
                    };
                    if s < se && ss < e {
                        return Err(Error::rule(
                            layer_id,
                            format!(
                                "[{s}, {e}] overlaps sibling {} [{ss}, {se}]",
                                sibling.id()
                            ),
                        ));
                    }
                }
            }
        }

        if layer.parent_includes {
            if let Some(p) = parent.and_then(|p| self.annotations.get(p)) {
                let parent_aligned = self
                    .schema
                    .layer(p.layer_id())
                    .map_or(false, |l| l.alignment == Alignment::Interval);
                if parent_aligned {
                    let (ps, pe) = (self.offset(p.start()), self.offset(p.end()));
                    let outside = matches!((s, ps), (Some(s), Some(ps)) if s < ps)
                        || matches!((e, pe), (Some(e), Some(pe)) if e > pe);
                    if outside {
                        return Err(Error::rule(
                            layer_id,
                            format!(
                                "[{}, {}] lies outside parent {} [{}, {}]",
                                fmt_offset(s),
                                fmt_offset(e),
                                p.id(),
                                fmt_offset(ps),
                                fmt_offset(pe)
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Insert without rule checks; ordinal defaults to after the last sibling.
    pub(crate) fn insert_new(
        &mut self,
        layer_id: &str,
        label: String,
        start: AnchorId,
        end: AnchorId,
        parent: Option<AnnotationId>,
        ordinal: Option<u32>,
    ) -> AnnotationId {
        let id = AnnotationId(self.allocate());
        let mut annotation = Annotation::new(id, layer_id, label, start, end, parent);
        let ordinal = ordinal.unwrap_or_else(|| self.annotations.max_ordinal(&SiblingKey::of(&annotation)) + 1);
        annotation.set_ordinal_raw(ordinal);
        self.annotations.insert(annotation);
        self.note_created(EntityRef::Annotation(id));
        id
    }

    // =========================================================================
    // Annotation attributes
    // =========================================================================

    /// Change a label.
    pub fn set_label(&mut self, id: AnnotationId, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        let layer_id = self.require(id)?.layer_id().to_string();
        if !self.schema.require(&layer_id)?.accepts_label(&label) {
            return Err(Error::rule(&layer_id, format!("'{label}' is not a valid label")));
        }
        if let Some(annotation) = self.annotations.get_mut(id) {
            if annotation.label() != label {
                let old = annotation.set_label_raw(label);
                self.note_update(EntityRef::Annotation(id), Attribute::Label, Value::Text(old));
            }
        }
        Ok(())
    }

    /// Change a label's confidence.
    pub fn set_confidence(&mut self, id: AnnotationId, confidence: Confidence) -> Result<()> {
        self.require(id)?;
        if let Some(annotation) = self.annotations.get_mut(id) {
            let old = annotation.set_confidence_raw(confidence);
            if old != confidence {
                self.note_update(EntityRef::Annotation(id), Attribute::Confidence, Value::Confidence(old));
            }
        }
        Ok(())
    }

    /// Repoint the start anchor.
    pub fn set_start(&mut self, id: AnnotationId, anchor: AnchorId) -> Result<()> {
        let end = self.require(id)?.end();
        self.set_anchors(id, anchor, end)
    }

    /// Repoint the end anchor.
    pub fn set_end(&mut self, id: AnnotationId, anchor: AnchorId) -> Result<()> {
        let start = self.require(id)?.start();
        self.set_anchors(id, start, anchor)
    }

    /// Repoint both anchors at once (the only way to move a tag).
    pub fn set_anchors(&mut self, id: AnnotationId, start: AnchorId, end: AnchorId) -> Result<()> {
        let annotation = self.require(id)?;
        let (old_start, old_end) = (annotation.start(), annotation.end());
        let layer = self.schema.require(annotation.layer_id())?;
        let s = self.require_anchor(start)?.offset();
        let e = self.require_anchor(end)?.offset();
        if layer.alignment.is_zero_width() && start != end {
            return Err(Error::rule(&layer.id, "zero-width annotations must keep start == end"));
        }
        if let (Some(s), Some(e)) = (s, e) {
            if s > e {
                return Err(Error::rule(&layer.id, format!("start {s} is after end {e}")));
            }
        }
        if start != old_start {
            self.annotations.relink_start(id, start);
            self.note_update(EntityRef::Annotation(id), Attribute::Start, Value::Anchor(old_start));
        }
        if end != old_end {
            self.annotations.relink_end(id, end);
            self.note_update(EntityRef::Annotation(id), Attribute::End, Value::Anchor(old_end));
        }
        Ok(())
    }

    /// Move under a different parent, after its last sibling there.
    pub fn set_parent(&mut self, id: AnnotationId, parent: Option<AnnotationId>) -> Result<()> {
        let annotation = self.require(id)?;
        let (old_parent, old_ordinal) = (annotation.parent(), annotation.ordinal());
        if old_parent == parent {
            return Ok(());
        }
        let layer = self.schema.require(annotation.layer_id())?;
        let parent_layer = layer.parent_id.as_deref().unwrap_or(self.schema.root_id());
        let layer_id = layer.id.clone();
        match parent {
            Some(p) => {
                let candidate = self.require(p)?;
                if candidate.layer_id() != parent_layer {
                    return Err(Error::rule(
                        &layer_id,
                        format!("parent {p} is on layer '{}', expected '{parent_layer}'", candidate.layer_id()),
                    ));
                }
            }
            None if !self.schema.is_root(parent_layer) && !self.is_fragment() => {
                return Err(Error::rule(
                    &layer_id,
                    format!("annotations need a parent on layer '{parent_layer}'"),
                ));
            }
            None => {}
        }
        let key = SiblingKey {
            parent,
            layer: layer_id,
        };
        let ordinal = self.annotations.max_ordinal(&key) + 1;
        self.annotations.reparent(id, parent, ordinal);
        self.note_update(EntityRef::Annotation(id), Attribute::Parent, Value::Parent(old_parent));
        self.note_update(EntityRef::Annotation(id), Attribute::Ordinal, Value::Ordinal(old_ordinal));
        Ok(())
    }

    /// Set an explicit ordinal (1-based).
    pub fn set_ordinal(&mut self, id: AnnotationId, ordinal: u32) -> Result<()> {
        let annotation = self.require(id)?;
        if ordinal == 0 {
            return Err(Error::rule(annotation.layer_id(), "ordinals start at 1"));
        }
        if annotation.ordinal() != ordinal {
            if let Some(old) = self.annotations.reorder(id, ordinal) {
                self.note_update(EntityRef::Annotation(id), Attribute::Ordinal, Value::Ordinal(old));
            }
        }
        Ok(())
    }

    /// Renumber live siblings to `1..=n`, closing gaps left by destruction.
    pub fn renumber_ordinals(&mut self, parent: Option<AnnotationId>, layer_id: &str) -> Result<()> {
        self.schema.require(layer_id)?;
        let ids: Vec<AnnotationId> = self.live_siblings(parent, layer_id).map(Annotation::id).collect();
        for (index, id) in ids.into_iter().enumerate() {
            self.set_ordinal(id, index as u32 + 1)?;
        }
        Ok(())
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    /// Destroy an annotation and its descendants; returns how many.
    ///
    /// While tracking, they stay readable (tagged `Destroy`) until commit.
    /// Anchors are never removed here.
    pub fn destroy(&mut self, id: AnnotationId) -> Result<usize> {
        self.require(id)?;
        let doomed = self.subtree(id);
        let tracking = self.tracker.is_some();
        for victim in &doomed {
            if tracking {
                self.note_destroyed(EntityRef::Annotation(*victim));
            } else {
                self.annotations.remove(*victim);
            }
        }
        Ok(doomed.len())
    }

    /// Destroy every annotation on a layer (and their descendants).
    pub fn destroy_all(&mut self, layer_id: &str) -> Result<usize> {
        self.schema.require(layer_id)?;
        let ids: Vec<AnnotationId> = self.annotations.on_layer(layer_id).collect();
        let mut count = 0;
        for id in ids {
            if self.annotations.get(id).map_or(false, Annotation::is_live) {
                count += self.destroy(id)?;
            }
        }
        Ok(count)
    }

    /// Live descendants of `id`, children before parents, `id` last.
    pub(crate) fn subtree(&self, id: AnnotationId) -> Vec<AnnotationId> {
        let mut out = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                out.push(current);
                continue;
            }
            stack.push((current, true));
            let Some(annotation) = self.annotations.get(current) else {
                continue;
            };
            for child_layer in self.schema.children_of(annotation.layer_id()) {
                for child in self.live_siblings(Some(current), &child_layer.id) {
                    stack.push((child.id(), false));
                }
            }
        }
        out
    }

    // =========================================================================
    // Change tracking
    // =========================================================================

    /// Start recording changes (no-op if already tracking).
    pub fn track_changes(&mut self) {
        if self.tracker.is_none() {
            self.tracker = Some(ChangeTracker::new());
        }
    }

    /// True while recording changes.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.tracker.is_some()
    }

    /// The change record, while tracking.
    #[must_use]
    pub fn tracker(&self) -> Option<&ChangeTracker> {
        self.tracker.as_ref()
    }

    /// Value an attribute held before the first change since tracking began.
    #[must_use]
    pub fn original(&self, entity: EntityRef, attribute: Attribute) -> Option<&Value> {
        self.tracker.as_ref()?.original(entity, attribute)
    }

    /// Net changes in the order they should be applied elsewhere: anchors
    /// and annotations created (parents first), then updates, then
    /// annotations destroyed (children first) and finally anchors destroyed.
    #[must_use]
    pub fn changes(&self) -> Vec<Change> {
        let Some(tracker) = self.tracker.as_ref() else {
            return Vec::new();
        };
        let depth = |entity: &EntityRef| match entity {
            EntityRef::Annotation(id) => self
                .annotations
                .get(*id)
                .and_then(|a| self.schema.depth(a.layer_id()))
                .unwrap_or(0),
            EntityRef::Anchor(_) => 0,
        };
        let rank = |entity: &EntityRef, kind: ChangeKind| -> (u8, i64) {
            let is_anchor = matches!(entity, EntityRef::Anchor(_));
            match (kind, is_anchor) {
                (ChangeKind::Create, true) => (0, 0),
                (ChangeKind::Create, false) => (1, depth(entity) as i64),
                (ChangeKind::Update, true) => (2, 0),
                (ChangeKind::Update, false) => (3, 0),
                (ChangeKind::Destroy, false) => (4, -(depth(entity) as i64)),
                (_, _) => (5, 0),
            }
        };
        let mut entries: Vec<(EntityRef, ChangeKind)> = tracker.iter().collect();
        entries.sort_by_key(|(entity, kind)| (rank(entity, *kind), *entity));
        entries
            .into_iter()
            .filter_map(|(entity, _)| tracker.change_for(entity))
            .collect()
    }

    /// Remove everything tagged `Destroy`, clear all tags and the record.
    pub fn commit(&mut self) -> CommitSummary {
        let mut summary = CommitSummary::default();
        if let Some(tracker) = self.tracker.as_ref() {
            for (_, kind) in tracker.iter() {
                match kind {
                    ChangeKind::Create => summary.created += 1,
                    ChangeKind::Update => summary.updated += 1,
                    _ => {}
                }
            }
        }
        summary.destroyed = self.sweep();
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.clear();
        }
        log::debug!(
            "graph {}: committed {} created, {} updated, {} destroyed",
            self.id,
            summary.created,
            summary.updated,
            summary.destroyed
        );
        summary
    }

    /// Stop tracking without applying or rolling back anything.
    ///
    /// Create/Update tags are cleared; entities already tagged `Destroy`
    /// stay hidden until the next [`Graph::commit`].
    pub fn discard_tracker(&mut self) -> Option<ChangeTracker> {
        let tracker = self.tracker.take()?;
        for (entity, kind) in tracker.iter() {
            if kind != ChangeKind::Destroy {
                self.set_tag(entity, ChangeKind::Unchanged);
            }
        }
        Some(tracker)
    }

    fn sweep(&mut self) -> usize {
        let doomed_annotations: Vec<AnnotationId> = self
            .annotations
            .iter()
            .filter(|a| !a.is_live())
            .map(Annotation::id)
            .collect();
        let doomed_anchors: Vec<AnchorId> = self
            .anchors
            .iter()
            .filter(|a| !a.is_live())
            .map(Anchor::id)
            .collect();
        let count = doomed_annotations.len() + doomed_anchors.len();
        for id in doomed_annotations {
            self.annotations.remove(id);
        }
        for id in doomed_anchors {
            self.anchors.remove(id);
        }
        let touched: Vec<EntityRef> = self
            .tracker
            .as_ref()
            .map(|t| t.iter().map(|(e, _)| e).collect())
            .unwrap_or_default();
        for entity in touched {
            self.set_tag(entity, ChangeKind::Unchanged);
        }
        count
    }

    fn set_tag(&mut self, entity: EntityRef, kind: ChangeKind) {
        match entity {
            EntityRef::Anchor(id) => {
                if let Some(anchor) = self.anchors.get_mut(id) {
                    anchor.set_change(kind);
                }
            }
            EntityRef::Annotation(id) => {
                if let Some(annotation) = self.annotations.get_mut(id) {
                    annotation.set_change(kind);
                }
            }
        }
    }

    fn note_created(&mut self, entity: EntityRef) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.created(entity);
            self.set_tag(entity, ChangeKind::Create);
        }
    }

    fn note_update(&mut self, entity: EntityRef, attribute: Attribute, old: Value) {
        if let Some(tracker) = self.tracker.as_mut() {
            let kind = tracker.updated(entity, attribute, old);
            self.set_tag(entity, kind);
        }
    }

    fn note_destroyed(&mut self, entity: EntityRef) {
        if let Some(tracker) = self.tracker.as_mut() {
            let kind = tracker.destroyed(entity);
            self.set_tag(entity, kind);
        }
    }
}

/// Offset for messages: the number, or `?` when unset.
pub(crate) fn fmt_offset(offset: Option<f64>) -> String {
    offset.map_or_else(|| "?".to_string(), |o| o.to_string())
}

// =============================================================================
// Serialization
// =============================================================================

/// Flat serialized form; indices are rebuilt on load.
#[derive(Serialize, Deserialize)]
struct GraphData {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    corpus: Option<String>,
    schema: Schema,
    #[serde(default)]
    config: GraphConfig,
    anchors: Vec<Anchor>,
    annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<FragmentSource>,
    #[serde(default)]
    next_id: u64,
}

impl From<Graph> for GraphData {
    fn from(graph: Graph) -> Self {
        Self {
            anchors: graph.anchors.iter().cloned().collect(),
            annotations: graph.annotations.iter().cloned().collect(),
            id: graph.id,
            corpus: graph.corpus,
            schema: graph.schema,
            config: graph.config,
            source: graph.source,
            next_id: graph.next_id,
        }
    }
}

impl TryFrom<GraphData> for Graph {
    type Error = Error;

    fn try_from(data: GraphData) -> Result<Self> {
        data.config.validate()?;
        let mut graph = Graph::new(data.id, data.schema);
        graph.corpus = data.corpus;
        graph.config = data.config;
        graph.source = data.source;
        graph.anchors = AnchorStore::new(data.config.offset_granularity);
        let mut max_id = 0;
        for anchor in data.anchors {
            max_id = max_id.max(anchor.id().0);
            graph.anchors.insert(anchor);
        }
        for annotation in data.annotations {
            graph.schema.require(annotation.layer_id())?;
            for anchor in [annotation.start(), annotation.end()] {
                if !graph.anchors.contains(anchor) {
                    return Err(Error::UnknownAnchor(anchor));
                }
            }
            max_id = max_id.max(annotation.id().0);
            graph.annotations.insert(annotation);
        }
        graph.next_id = data.next_id.max(max_id + 1);
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;

    fn schema() -> Schema {
        let mut s = Schema::conventional();
        s.add_layer(Layer::tag("pos").with_parent("word")).unwrap();
        s.add_layer(Layer::interval("phone").with_parent("word").with_peers_overlap(false))
            .unwrap();
        s.add_layer(Layer::interval("token").with_parent("turn")).unwrap();
        s
    }

    /// participant -> turn [0,10] with no words yet.
    fn skeleton() -> (Graph, AnnotationId) {
        let mut g = Graph::new("test", schema());
        let a0 = g.get_or_create_anchor_at(0.0, Confidence::Manual).unwrap();
        let a10 = g.get_or_create_anchor_at(10.0, Confidence::Manual).unwrap();
        let who = g.create_annotation("participant", "A", a0, a0, None).unwrap();
        let turn = g.create_annotation("turn", "A", a0, a10, Some(who)).unwrap();
        (g, turn)
    }

    fn word(g: &mut Graph, turn: AnnotationId, label: &str, s: f64, e: f64) -> AnnotationId {
        let s = g.get_or_create_anchor_at(s, Confidence::Default).unwrap();
        let e = g.get_or_create_anchor_at(e, Confidence::Default).unwrap();
        g.create_annotation("word", label, s, e, Some(turn)).unwrap()
    }

    #[test]
    fn adjacent_words_share_anchor() {
        let (mut g, turn) = skeleton();
        let a = word(&mut g, turn, "a", 1.0, 2.0);
        let b = word(&mut g, turn, "b", 2.0, 3.0);
        assert_eq!(g.get(a).unwrap().end(), g.get(b).unwrap().start());
    }

    #[test]
    fn anchor_confidence_upgrades_not_downgrades() {
        let (mut g, _) = skeleton();
        let id = g.get_or_create_anchor_at(5.0, Confidence::Automatic).unwrap();
        assert_eq!(g.get_or_create_anchor_at(5.0, Confidence::None).unwrap(), id);
        assert_eq!(g.anchor(id).unwrap().confidence(), Confidence::Automatic);
        assert_eq!(g.get_or_create_anchor_at(5.0, Confidence::Manual).unwrap(), id);
        assert_eq!(g.anchor(id).unwrap().confidence(), Confidence::Manual);
        assert_eq!(g.offset(id), Some(5.0));
    }

    #[test]
    fn weaker_offset_ignored() {
        let (mut g, _) = skeleton();
        let id = g.get_or_create_anchor_at(5.0, Confidence::Manual).unwrap();
        assert!(!g.set_anchor_offset(id, Some(6.0), Confidence::Automatic).unwrap());
        assert_eq!(g.offset(id), Some(5.0));
        assert!(g.set_anchor_offset(id, Some(6.0), Confidence::Manual).unwrap());
        assert_eq!(g.anchor_at(6.0), Some(id));
        assert_eq!(g.anchor_at(5.0), None);
    }

    #[test]
    fn unset_offset_placed_at_any_confidence() {
        let (mut g, _) = skeleton();
        let id = g.create_anchor(None, Confidence::Default).unwrap();
        assert!(g.set_anchor_offset(id, Some(1.0), Confidence::Automatic).unwrap());
        assert_eq!(g.offset(id), Some(1.0));
        assert_eq!(g.anchor(id).unwrap().confidence(), Confidence::Automatic);
        assert!(!g.set_anchor_offset(id, Some(2.0), Confidence::None).unwrap());
    }

    #[test]
    fn ordinals_count_siblings() {
        let (mut g, turn) = skeleton();
        let a = word(&mut g, turn, "a", 1.0, 2.0);
        let b = word(&mut g, turn, "b", 2.0, 3.0);
        assert_eq!(g.get(a).unwrap().ordinal(), 1);
        assert_eq!(g.get(b).unwrap().ordinal(), 2);
    }

    #[test]
    fn ordinal_gap_after_destroy_until_renumbered() {
        let (mut g, turn) = skeleton();
        let a = word(&mut g, turn, "a", 1.0, 2.0);
        let b = word(&mut g, turn, "b", 2.0, 3.0);
        let c = word(&mut g, turn, "c", 3.0, 4.0);
        g.destroy(b).unwrap();
        assert_eq!(g.get(c).unwrap().ordinal(), 3);
        let d = word(&mut g, turn, "d", 4.0, 5.0);
        assert_eq!(g.get(d).unwrap().ordinal(), 4);
        g.renumber_ordinals(Some(turn), "word").unwrap();
        let ordinals: Vec<u32> = [a, c, d].iter().map(|id| g.get(*id).unwrap().ordinal()).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }

    #[test]
    fn pending_destroy_frees_its_ordinal() {
        let (mut g, turn) = skeleton();
        g.track_changes();
        word(&mut g, turn, "a", 1.0, 2.0);
        let b = word(&mut g, turn, "b", 2.0, 3.0);
        g.destroy(b).unwrap();
        assert!(g.get(b).is_some_and(|a| !a.is_live()));
        let c = word(&mut g, turn, "c", 3.0, 4.0);
        assert_eq!(g.get(c).unwrap().ordinal(), 2);
    }

    #[test]
    fn peers_false_rejects_second_sibling() {
        let (mut g, turn) = skeleton();
        let w = word(&mut g, turn, "dog", 1.0, 2.0);
        g.create_tag(w, "pos", "NN").unwrap();
        let err = g.create_tag(w, "pos", "VB").unwrap_err();
        assert!(matches!(err, Error::RuleViolation { ref layer, .. } if layer == "pos"));
    }

    #[test]
    fn overlap_rejected_but_shared_boundary_allowed() {
        let (mut g, turn) = skeleton();
        word(&mut g, turn, "a", 1.0, 2.0);
        let s = g.get_or_create_anchor_at(1.5, Confidence::Default).unwrap();
        let e = g.get_or_create_anchor_at(2.5, Confidence::Default).unwrap();
        assert!(g.create_annotation("word", "x", s, e, Some(turn)).is_err());
        word(&mut g, turn, "b", 2.0, 3.0);
    }

    #[test]
    fn parent_includes_checked_for_interval_parent() {
        let (mut g, turn) = skeleton();
        let s = g.get_or_create_anchor_at(9.0, Confidence::Default).unwrap();
        let e = g.get_or_create_anchor_at(11.0, Confidence::Default).unwrap();
        let err = g.create_annotation("word", "late", s, e, Some(turn)).unwrap_err();
        assert!(err.to_string().contains("outside parent"));
    }

    #[test]
    fn wrong_parent_layer_rejected() {
        let (mut g, turn) = skeleton();
        let w = word(&mut g, turn, "a", 1.0, 2.0);
        let s = g.get_or_create_anchor_at(1.0, Confidence::Default).unwrap();
        let e = g.get_or_create_anchor_at(2.0, Confidence::Default).unwrap();
        assert!(g.create_annotation("word", "b", s, e, Some(w)).is_err());
        assert!(g.create_annotation("word", "b", s, e, None).is_err());
    }

    #[test]
    fn reversed_span_rejected() {
        let (mut g, turn) = skeleton();
        let s = g.get_or_create_anchor_at(3.0, Confidence::Default).unwrap();
        let e = g.get_or_create_anchor_at(2.0, Confidence::Default).unwrap();
        assert!(g.create_annotation("word", "x", s, e, Some(turn)).is_err());
    }

    #[test]
    fn tag_is_zero_width_and_adds_no_anchor() {
        let (mut g, turn) = skeleton();
        let w = word(&mut g, turn, "dog", 1.0, 2.0);
        let before = g.anchors().len();
        let tag = g.create_tag(w, "pos", "NN").unwrap();
        let tag = g.get(tag).unwrap();
        assert_eq!(tag.start(), tag.end());
        assert_eq!(tag.start(), g.get(w).unwrap().start());
        assert_eq!(tag.parent(), Some(w));
        assert_eq!(g.anchors().len(), before);
    }

    #[test]
    fn tag_on_interval_layer_is_configuration_error() {
        let (mut g, turn) = skeleton();
        let w = word(&mut g, turn, "dog", 1.0, 2.0);
        assert!(g.create_tag(w, "phone", "d").unwrap_err().is_configuration());
    }

    #[test]
    fn subdivision_partitions_label() {
        let (mut g, turn) = skeleton();
        let w = word(&mut g, turn, "can't", 1.0, 2.0);
        let first = g.create_subdivision(w, "token", "ca").unwrap();
        let second = g.create_subdivision(w, "token", "n't").unwrap();
        let (first, second) = (g.get(first).unwrap(), g.get(second).unwrap());
        assert_eq!(first.start(), g.get(w).unwrap().start());
        assert_eq!(first.end(), second.start());
        assert_eq!(second.end(), g.get(w).unwrap().end());
        assert_eq!(g.offset(first.end()), None);
        assert_eq!(second.ordinal(), first.ordinal() + 1);
        assert!(g.create_subdivision(w, "token", "x").is_err());
    }

    #[test]
    fn subdivision_mismatch_is_transformation_error() {
        let (mut g, turn) = skeleton();
        let w = word(&mut g, turn, "statute", 1.0, 2.0);
        g.create_subdivision(w, "token", "stat").unwrap();
        let err = g.create_subdivision(w, "token", "ue").unwrap_err();
        assert!(matches!(err, Error::Transformation(ref m) if m.contains("'ute'")));
    }

    #[test]
    fn insert_after_shifts_later_siblings() {
        let (mut g, turn) = skeleton();
        let a = word(&mut g, turn, "a", 1.0, 2.0);
        let b = word(&mut g, turn, "b", 2.0, 3.0);
        let x = g.insert_after(a, "x").unwrap();
        assert_eq!(g.get(x).unwrap().ordinal(), 2);
        assert_eq!(g.get(b).unwrap().ordinal(), 3);
        assert_eq!(g.get(a).unwrap().end(), g.get(x).unwrap().start());
        assert_eq!(g.get(x).unwrap().end(), g.get(b).unwrap().start());
    }

    #[test]
    fn insert_before_takes_ordinal() {
        let (mut g, turn) = skeleton();
        let a = word(&mut g, turn, "a", 1.0, 2.0);
        let x = g.insert_before(a, "x").unwrap();
        assert_eq!(g.get(x).unwrap().ordinal(), 1);
        assert_eq!(g.get(a).unwrap().ordinal(), 2);
        assert_eq!(g.offset(g.get(x).unwrap().start()), Some(1.0));
    }

    #[test]
    fn offset_bounds_walk_neighbours() {
        let (mut g, turn) = skeleton();
        let a = word(&mut g, turn, "a", 1.0, 3.0);
        let x = g.insert_after(a, "x").unwrap();
        let middle = g.get(x).unwrap().start();
        assert_eq!(g.offset_min(middle), Some(1.0));
        assert_eq!(g.offset_max(middle), Some(3.0));
    }

    #[test]
    fn destroy_cascades_and_keeps_anchors() {
        let (mut g, turn) = skeleton();
        let w = word(&mut g, turn, "dog", 1.0, 2.0);
        let tag = g.create_tag(w, "pos", "NN").unwrap();
        let anchors = g.anchors().len();
        assert_eq!(g.destroy(w).unwrap(), 2);
        assert!(g.get(tag).is_none());
        assert!(g.require(w).is_err());
        assert_eq!(g.anchors().len(), anchors);
    }

    #[test]
    fn tracked_destroy_visible_until_commit() {
        let (mut g, turn) = skeleton();
        let w = word(&mut g, turn, "dog", 1.0, 2.0);
        g.track_changes();
        g.destroy(w).unwrap();
        assert_eq!(g.get(w).unwrap().change(), ChangeKind::Destroy);
        assert!(g.require(w).is_err());
        let summary = g.commit();
        assert_eq!(summary.destroyed, 1);
        assert!(g.get(w).is_none());
    }

    #[test]
    fn create_then_destroy_leaves_nothing() {
        let (mut g, turn) = skeleton();
        g.track_changes();
        let w = word(&mut g, turn, "dog", 1.0, 2.0);
        g.destroy(w).unwrap();
        g.commit();
        assert!(g.get(w).is_none());
        assert!(g.tracker().unwrap().is_empty());
        assert!(g.annotations().iter().all(|a| a.change() == ChangeKind::Unchanged));
    }

    #[test]
    fn repeated_updates_are_idempotent() {
        let (mut g, turn) = skeleton();
        let w = word(&mut g, turn, "dog", 1.0, 2.0);
        g.track_changes();
        g.set_label(w, "cat").unwrap();
        g.set_label(w, "cow").unwrap();
        let changes = g.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].originals, vec![(Attribute::Label, Value::Text("dog".into()))]);
        assert_eq!(g.get(w).unwrap().change(), ChangeKind::Update);
    }

    #[test]
    fn changes_order_parents_first() {
        let (mut g, turn) = skeleton();
        g.track_changes();
        let w = word(&mut g, turn, "dog", 1.0, 2.0);
        g.create_tag(w, "pos", "NN").unwrap();
        let kinds: Vec<EntityRef> = g.changes().into_iter().map(|c| c.entity).collect();
        let word_at = kinds.iter().position(|e| *e == EntityRef::Annotation(w)).unwrap();
        assert!(matches!(kinds[0], EntityRef::Anchor(_)));
        assert_eq!(kinds.last(), Some(&EntityRef::Annotation(AnnotationId(w.0 + 1))));
        assert!(word_at < kinds.len() - 1);
    }

    #[test]
    fn discard_keeps_state() {
        let (mut g, turn) = skeleton();
        g.track_changes();
        let w = word(&mut g, turn, "dog", 1.0, 2.0);
        let record = g.discard_tracker().unwrap();
        assert!(!record.is_empty());
        assert!(!g.is_tracking());
        assert_eq!(g.get(w).unwrap().change(), ChangeKind::Unchanged);
    }

    #[test]
    fn anchor_in_use_cannot_be_destroyed() {
        let (mut g, turn) = skeleton();
        let w = word(&mut g, turn, "dog", 1.0, 2.0);
        let start = g.get(w).unwrap().start();
        assert!(matches!(g.destroy_anchor(start), Err(Error::AnchorInUse(_))));
        let loose = g.create_anchor(Some(7.0), Confidence::None).unwrap();
        g.destroy_anchor(loose).unwrap();
        assert!(g.anchor(loose).is_none());
    }

    #[test]
    fn json_roundtrip_rebuilds_indices() {
        let (mut g, turn) = skeleton();
        let w = word(&mut g, turn, "dog", 1.0, 2.0);
        let json = serde_json::to_string(&g).unwrap();
        let back: Graph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.annotations().children(Some(turn), "word"), &[w]);
        assert_eq!(back.anchor_at(2.0), g.anchor_at(2.0));
        let mut back = back;
        let next = back.create_anchor(None, Confidence::None).unwrap();
        assert!(next.0 > w.0);
    }

    #[test]
    fn shift_moves_all_offsets() {
        let (mut g, turn) = skeleton();
        word(&mut g, turn, "dog", 1.0, 2.0);
        g.shift_anchors(0.5).unwrap();
        assert!(g.anchor_at(1.5).is_some());
        assert!(g.anchor_at(1.0).is_none());
    }
}
