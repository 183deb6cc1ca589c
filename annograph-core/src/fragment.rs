//! Fragments: self-contained sub-graphs covering a time window.
//!
//! A fragment is a full [`Graph`] whose id encodes where it came from:
//!
//! ```text
//!   <graph id>__<start>-<end>[.<ext>]      e.g.  "interview.trs__10.5-20"
//! ```
//!
//! Offsets print in their shortest exact decimal form, so parsing an id
//! gives back the same numbers that built it. Anchor and annotation ids are
//! kept, which lets a processed fragment's changes be applied back to its
//! source with [`Graph::apply_fragment_changes`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::anchor::{check_offset, AnchorId, AnchorStore};
use crate::annotation::AnnotationId;
use crate::change::{Attribute, ChangeKind, EntityRef};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::layer::Alignment;
use crate::query::intersects;

static FRAGMENT_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(.*)__(-?[0-9]+(?:\.[0-9]+)?)-(-?[0-9]+(?:\.[0-9]+)?)(\.[A-Za-z][A-Za-z0-9]*)?$")
        .expect("fragment id pattern is valid")
});

/// Where a fragment was taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentSource {
    /// Id of the source graph.
    pub graph_id: String,
    /// Window start.
    pub start: f64,
    /// Window end (exclusive).
    pub end: f64,
}

/// Parsed form of a fragment id.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentId {
    /// Id of the source graph.
    pub graph_id: String,
    /// Window start.
    pub start: f64,
    /// Window end.
    pub end: f64,
    /// Trailing extension such as `.wav`, if present.
    pub extension: Option<String>,
}

impl FragmentId {
    /// Id for the window `[start, end)` of `graph_id`.
    #[must_use]
    pub fn new(graph_id: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            graph_id: graph_id.into(),
            start,
            end,
            extension: None,
        }
    }

    /// Append an extension (with or without the leading dot).
    #[must_use]
    pub fn with_extension(mut self, extension: &str) -> Self {
        let ext = extension.trim_start_matches('.');
        self.extension = (!ext.is_empty()).then(|| format!(".{ext}"));
        self
    }

    /// Parse `<graph>__<start>-<end>[.<ext>]`.
    pub fn parse(s: &str) -> Result<Self> {
        let caps = FRAGMENT_ID
            .captures(s)
            .ok_or_else(|| Error::InvalidFragmentId(s.to_string()))?;
        let number = |i: usize| -> Result<f64> {
            caps[i]
                .parse::<f64>()
                .map_err(|_| Error::InvalidFragmentId(s.to_string()))
        };
        let graph_id = caps[1].to_string();
        if graph_id.is_empty() {
            return Err(Error::InvalidFragmentId(s.to_string()));
        }
        Ok(Self {
            graph_id,
            start: number(2)?,
            end: number(3)?,
            extension: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    /// The window as a source reference.
    #[must_use]
    pub fn source(&self) -> FragmentSource {
        FragmentSource {
            graph_id: self.graph_id.clone(),
            start: self.start,
            end: self.end,
        }
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}__{}-{}", self.graph_id, self.start, self.end)?;
        if let Some(ext) = &self.extension {
            f.write_str(ext)?;
        }
        Ok(())
    }
}

impl FromStr for FragmentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Source ids assigned to entities a fragment created.
///
/// Entities that existed before extraction keep their ids and are not
/// listed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMap {
    /// Fragment anchor id -> source anchor id.
    pub anchors: HashMap<AnchorId, AnchorId>,
    /// Fragment annotation id -> source annotation id.
    pub annotations: HashMap<AnnotationId, AnnotationId>,
}

impl IdMap {
    /// Source id of a fragment anchor.
    #[must_use]
    pub fn anchor(&self, id: AnchorId) -> AnchorId {
        self.anchors.get(&id).copied().unwrap_or(id)
    }

    /// Source id of a fragment annotation.
    #[must_use]
    pub fn annotation(&self, id: AnnotationId) -> AnnotationId {
        self.annotations.get(&id).copied().unwrap_or(id)
    }
}

impl Graph {
    /// Copy the annotations on `layer_ids` that intersect `[start, end)`.
    ///
    /// The fragment gets the whole schema, the anchors its annotations use
    /// (same ids), and a media provider scoped to the window. Annotations
    /// whose parent was not copied become orphans. Root-level tag layers
    /// (participants, typically) are copied in full since they carry no
    /// offsets of their own.
    pub fn extract_fragment(&self, start: f64, end: f64, layer_ids: &[&str]) -> Result<Graph> {
        let start = check_offset(start)?;
        let end = check_offset(end)?;
        if start > end {
            return Err(Error::configuration(format!(
                "fragment window {start}-{end} ends before it starts"
            )));
        }
        for layer_id in layer_ids {
            self.schema().require(layer_id)?;
        }

        let id = FragmentId::new(self.id(), start, end);
        let mut fragment = Graph::new(id.to_string(), self.schema().clone());
        fragment.corpus = self.corpus.clone();
        fragment.config = self.config;
        fragment.anchors = AnchorStore::new(self.config.offset_granularity);
        fragment.source = Some(id.source());
        fragment.next_id = self.next_id;
        fragment.media = self
            .media
            .as_ref()
            .map(|provider| provider.for_fragment(&id.to_string(), start, end));

        let mut selected = BTreeSet::new();
        for layer_id in layer_ids {
            let wholesale = self.schema().layer(layer_id).is_some_and(|layer| {
                layer.alignment == Alignment::None
                    && self.schema().parent(layer_id).is_some_and(|p| self.schema().is_root(&p.id))
            });
            for annotation_id in self.annotations.on_layer(layer_id) {
                let Some(annotation) = self.get(annotation_id).filter(|a| a.is_live()) else {
                    continue;
                };
                if wholesale || intersects(self, annotation, start, end) {
                    selected.insert(annotation_id);
                }
            }
        }

        for &annotation_id in &selected {
            let Some(annotation) = self.get(annotation_id) else {
                continue;
            };
            for anchor_id in [annotation.start(), annotation.end()] {
                if fragment.anchors.contains(anchor_id) {
                    continue;
                }
                if let Some(anchor) = self.anchor(anchor_id) {
                    let mut anchor = anchor.clone();
                    anchor.set_change(ChangeKind::Unchanged);
                    fragment.anchors.insert(anchor);
                }
            }
            let mut copy = annotation.clone();
            copy.set_change(ChangeKind::Unchanged);
            if copy.parent().is_some_and(|p| !selected.contains(&p)) {
                copy.set_parent_raw(None);
            }
            fragment.annotations.insert(copy);
        }

        log::debug!(
            "extracted {} ({} annotations, {} anchors)",
            fragment.id(),
            fragment.annotations.len(),
            fragment.anchors.len()
        );
        Ok(fragment)
    }

    /// Fragment spanning one annotation's time extent.
    ///
    /// Unset offsets are bounded by the nearest set ones.
    pub fn fragment_of(&self, id: AnnotationId, layer_ids: &[&str]) -> Result<Graph> {
        let annotation = self.require(id)?;
        let start = self.offset_min(annotation.start());
        let end = self.offset_max(annotation.end());
        match (start, end) {
            (Some(start), Some(end)) => self.extract_fragment(start, end, layer_ids),
            _ => Err(Error::configuration(format!(
                "annotation {id} has no offsets to take a fragment around"
            ))),
        }
    }

    /// Replay a tracked fragment's changes onto this (its source) graph.
    ///
    /// New anchors are merged by offset, new annotations get fresh ids here
    /// (see the returned [`IdMap`]), and a new annotation whose parent was
    /// outside the fragment is attached to the annotation on the parent
    /// layer that contains it.
    pub fn apply_fragment_changes(&mut self, fragment: &Graph) -> Result<IdMap> {
        self.apply_owned_fragment_changes(fragment, |_| true)
    }

    /// [`Self::apply_fragment_changes`], limited to annotations the fragment
    /// owns.
    ///
    /// `owns` is asked about annotations that existed before extraction. A
    /// new annotation follows its nearest pre-existing ancestor (new
    /// top-level ones are always kept). Changes to anchors used only by
    /// skipped annotations are skipped too.
    pub fn apply_owned_fragment_changes<F>(&mut self, fragment: &Graph, owns: F) -> Result<IdMap>
    where
        F: Fn(AnnotationId) -> bool,
    {
        let source = fragment.source().ok_or_else(|| {
            Error::configuration(format!("graph '{}' is not a fragment", fragment.id()))
        })?;
        if source.graph_id != self.id() {
            return Err(Error::configuration(format!(
                "fragment '{}' was taken from '{}', not '{}'",
                fragment.id(),
                source.graph_id,
                self.id()
            )));
        }

        let mut map = IdMap::default();
        let mut skipped = 0usize;
        for change in fragment.changes() {
            let kept = match change.entity {
                EntityRef::Annotation(fid) => owned_annotation(fragment, fid, &owns),
                EntityRef::Anchor(fid) => owned_anchor(fragment, fid, &owns),
            };
            if !kept {
                skipped += 1;
                continue;
            }
            match (change.entity, change.kind) {
                (EntityRef::Anchor(fid), ChangeKind::Create) => {
                    let Some(anchor) = fragment.anchor(fid) else {
                        continue;
                    };
                    let id = match anchor.offset() {
                        Some(offset) => self.get_or_create_anchor_at(offset, anchor.confidence())?,
                        None => self.create_anchor(None, anchor.confidence())?,
                    };
                    map.anchors.insert(fid, id);
                }
                (EntityRef::Annotation(fid), ChangeKind::Create) => {
                    let Some(annotation) = fragment.get(fid) else {
                        continue;
                    };
                    let start = map.anchor(annotation.start());
                    let end = map.anchor(annotation.end());
                    let parent = match annotation.parent() {
                        Some(p) => Some(map.annotation(p)),
                        None => self.containing_parent(annotation.layer_id(), start, end)?,
                    };
                    let id = self.create_annotation(
                        annotation.layer_id(),
                        annotation.label(),
                        start,
                        end,
                        parent,
                    )?;
                    self.set_confidence(id, annotation.confidence())?;
                    map.annotations.insert(fid, id);
                }
                (EntityRef::Anchor(fid), ChangeKind::Update) => {
                    let Some(anchor) = fragment.anchor(fid) else {
                        continue;
                    };
                    if self.anchor(fid).is_some_and(|a| a.is_live())
                        && !self.set_anchor_offset(fid, anchor.offset(), anchor.confidence())?
                    {
                        log::warn!("anchor {fid}: fragment offset is weaker than the source's, kept source");
                    }
                }
                (EntityRef::Annotation(fid), ChangeKind::Update) => {
                    let Some(annotation) = fragment.get(fid) else {
                        continue;
                    };
                    if self.require(fid).is_err() {
                        log::warn!("annotation {fid} is gone from the source, skipping its update");
                        continue;
                    }
                    for (attribute, _) in &change.originals {
                        match attribute {
                            Attribute::Label => self.set_label(fid, annotation.label())?,
                            Attribute::Confidence => self.set_confidence(fid, annotation.confidence())?,
                            Attribute::Start | Attribute::End => self.set_anchors(
                                fid,
                                map.anchor(annotation.start()),
                                map.anchor(annotation.end()),
                            )?,
                            Attribute::Parent => {
                                // An orphan in the fragment still has its parent here.
                                if let Some(p) = annotation.parent() {
                                    self.set_parent(fid, Some(map.annotation(p)))?;
                                }
                            }
                            Attribute::Ordinal => self.set_ordinal(fid, annotation.ordinal())?,
                            Attribute::Offset => {}
                        }
                    }
                }
                (EntityRef::Annotation(fid), ChangeKind::Destroy) => {
                    if self.require(fid).is_ok() {
                        self.destroy(fid)?;
                    }
                }
                (EntityRef::Anchor(fid), ChangeKind::Destroy) => {
                    if self.anchor(fid).is_some_and(|a| a.is_live()) {
                        match self.destroy_anchor(fid) {
                            Err(Error::AnchorInUse(_)) => {
                                log::debug!("anchor {fid} still used outside the fragment, kept");
                            }
                            other => other?,
                        }
                    }
                }
                (_, ChangeKind::Unchanged) => {}
            }
        }
        if skipped > 0 {
            log::debug!("{}: skipped {skipped} changes owned by other fragments", fragment.id());
        }
        log::info!(
            "applied {} to {}: {} annotations and {} anchors created",
            fragment.id(),
            self.id(),
            map.annotations.len(),
            map.anchors.len()
        );
        Ok(map)
    }

    fn containing_parent(
        &self,
        layer_id: &str,
        start: AnchorId,
        end: AnchorId,
    ) -> Result<Option<AnnotationId>> {
        let parent_layer = match self.schema().parent(layer_id) {
            Some(p) if !self.schema().is_root(&p.id) => p.id.clone(),
            _ => return Ok(None),
        };
        let (Some(s), Some(e)) = (self.offset_min(start), self.offset_max(end)) else {
            return Err(Error::transformation(format!(
                "cannot place unanchored '{layer_id}' annotation under a '{parent_layer}'"
            )));
        };
        self.all(&parent_layer)
            .into_iter()
            .find(|p| {
                p.start_bound().is_some_and(|ps| ps <= s) && p.end_bound().is_some_and(|pe| e <= pe)
            })
            .map(|p| Some(p.id()))
            .ok_or_else(|| {
                Error::transformation(format!(
                    "no '{parent_layer}' annotation contains the new '{layer_id}' annotation at {s}-{e}"
                ))
            })
    }
}

fn owned_annotation<F>(fragment: &Graph, id: AnnotationId, owns: &F) -> bool
where
    F: Fn(AnnotationId) -> bool,
{
    let mut current = id;
    loop {
        let Some(annotation) = fragment.get(current) else {
            return true;
        };
        if annotation.change() != ChangeKind::Create {
            return owns(current);
        }
        match annotation.parent() {
            Some(parent) => current = parent,
            None => return true,
        }
    }
}

fn owned_anchor<F>(fragment: &Graph, id: AnchorId, owns: &F) -> bool
where
    F: Fn(AnnotationId) -> bool,
{
    let store = fragment.annotations();
    let mut users = store.starting_at(id).chain(store.ending_at(id)).peekable();
    users.peek().is_none() || users.any(|a| owned_annotation(fragment, a, owns))
}
