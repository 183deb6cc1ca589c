//! Hierarchy and temporal queries.
//!
//! # Navigation
//!
//! `first` / `all` / `list` / `every` resolve a target layer relative to the
//! caller's own layer:
//!
//! ```text
//!   target is ...            result
//!   ─────────────────────    ──────────────────────────────────────────────
//!   the caller's layer       the caller itself
//!   an ancestor layer        the caller's ancestor on that layer
//!   a descendant layer       descendants in time order (see below)
//!   a cousin layer           annotations under the common ancestor that
//!                            include the caller or that it includes
//! ```
//!
//! Descendants are ordered by the highest aligned layer between the caller
//! and the target: `graph.every("word")` walks turns in time order (across
//! participants), then each turn's words by ordinal.
//!
//! Queries never fail; unknown layers yield nothing.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;

use crate::annotation::{Annotation, AnnotationId};
use crate::graph::Graph;

/// An annotation together with the graph it lives in.
#[derive(Clone, Copy)]
pub struct AnnotationRef<'g> {
    graph: &'g Graph,
    annotation: &'g Annotation,
}

impl fmt::Debug for AnnotationRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.annotation.fmt(f)
    }
}

impl Deref for AnnotationRef<'_> {
    type Target = Annotation;

    fn deref(&self) -> &Annotation {
        self.annotation
    }
}

impl PartialEq for AnnotationRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.annotation.id() == other.annotation.id() && std::ptr::eq(self.graph, other.graph)
    }
}

impl<'g> AnnotationRef<'g> {
    pub(crate) fn new(graph: &'g Graph, annotation: &'g Annotation) -> Self {
        Self { graph, annotation }
    }

    /// The owning graph.
    #[must_use]
    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// The annotation, with the graph's lifetime.
    #[must_use]
    pub fn annotation(&self) -> &'g Annotation {
        self.annotation
    }

    // =========================================================================
    // Temporal
    // =========================================================================

    /// Start offset, if set.
    #[must_use]
    pub fn start_offset(&self) -> Option<f64> {
        self.graph.offset(self.annotation.start())
    }

    /// End offset, if set.
    #[must_use]
    pub fn end_offset(&self) -> Option<f64> {
        self.graph.offset(self.annotation.end())
    }

    /// Start offset, or its nearest known lower bound.
    #[must_use]
    pub fn start_bound(&self) -> Option<f64> {
        self.graph.offset_min(self.annotation.start())
    }

    /// End offset, or its nearest known upper bound.
    #[must_use]
    pub fn end_bound(&self) -> Option<f64> {
        self.graph.offset_max(self.annotation.end())
    }

    /// True if both offsets are set.
    #[must_use]
    pub fn is_anchored(&self) -> bool {
        self.start_offset().is_some() && self.end_offset().is_some()
    }

    /// `end - start`, when both are set.
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        Some(self.end_offset()? - self.start_offset()?)
    }

    /// Middle of the span, when both offsets are set.
    #[must_use]
    pub fn midpoint(&self) -> Option<f64> {
        Some((self.start_offset()? + self.end_offset()?) / 2.0)
    }

    /// True if `start <= offset < end`.
    #[must_use]
    pub fn includes_offset(&self, offset: f64) -> bool {
        matches!(
            (self.start_bound(), self.end_bound()),
            (Some(s), Some(e)) if s <= offset && offset < e
        )
    }

    /// True if `other` starts inside this span and ends inside it (or at its end).
    #[must_use]
    pub fn includes(&self, other: &Annotation) -> bool {
        let (Some(os), Some(oe)) = (
            self.graph.offset_min(other.start()),
            self.graph.offset_max(other.end()),
        ) else {
            return false;
        };
        self.includes_offset(os) && (self.includes_offset(oe) || self.end_bound() == Some(oe))
    }

    /// True if `other`'s midpoint falls inside this span.
    #[must_use]
    pub fn includes_midpoint_of(&self, other: &Annotation) -> bool {
        match (
            self.graph.offset_min(other.start()),
            self.graph.offset_max(other.end()),
        ) {
            (Some(s), Some(e)) => self.includes_offset((s + e) / 2.0),
            _ => false,
        }
    }

    /// True if the spans share more than a boundary.
    #[must_use]
    pub fn overlaps(&self, other: &Annotation) -> bool {
        match (
            self.start_bound(),
            self.end_bound(),
            self.graph.offset_min(other.start()),
            self.graph.offset_max(other.end()),
        ) {
            (Some(s), Some(e), Some(os), Some(oe)) => s < oe && os < e,
            _ => false,
        }
    }

    /// Gap between the spans (0 when they touch or overlap).
    #[must_use]
    pub fn distance(&self, other: &Annotation) -> Option<f64> {
        let (s, e) = (self.start_bound()?, self.end_bound()?);
        let os = self.graph.offset_min(other.start())?;
        let oe = self.graph.offset_max(other.end())?;
        Some(if oe <= s {
            s - oe
        } else if e <= os {
            os - e
        } else {
            0.0
        })
    }

    /// True if this is a zero-width annotation sitting on `other`'s start.
    #[must_use]
    pub fn tags(&self, other: &Annotation) -> bool {
        self.annotation.is_zero_width() && self.annotation.start() == other.start()
    }

    /// Live annotations on `layer_id` that tag this one.
    #[must_use]
    pub fn tags_on(&self, layer_id: &str) -> Vec<AnnotationRef<'g>> {
        let graph = self.graph;
        let mut tags: Vec<AnnotationRef<'g>> = graph
            .annotations()
            .starting_at(self.annotation.start())
            .filter_map(|id| graph.annotation(id))
            .filter(|a| a.is_live() && a.layer_id() == layer_id && a.tags(self.annotation))
            .filter(|a| a.id() != self.annotation.id())
            .collect();
        tags.sort_by_key(|a| (a.ordinal(), a.id()));
        tags
    }

    // =========================================================================
    // Structural
    // =========================================================================

    /// Parent annotation, unless attached to the root.
    #[must_use]
    pub fn parent(&self) -> Option<AnnotationRef<'g>> {
        self.graph.annotation(self.annotation.parent()?)
    }

    /// Ancestors, nearest first.
    #[must_use]
    pub fn ancestors(&self) -> Vec<AnnotationRef<'g>> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(ancestor) = current {
            if out.iter().any(|a: &AnnotationRef<'g>| a.id() == ancestor.id()) {
                break;
            }
            current = ancestor.parent();
            out.push(ancestor);
        }
        out
    }

    /// Ancestor on `layer_id`.
    #[must_use]
    pub fn ancestor_on(&self, layer_id: &str) -> Option<AnnotationRef<'g>> {
        self.ancestors().into_iter().find(|a| a.layer_id() == layer_id)
    }

    /// Nearest annotation that is an ancestor of (or equal to) both.
    #[must_use]
    pub fn first_common_ancestor(&self, other: &Annotation) -> Option<AnnotationRef<'g>> {
        let other = self.graph.annotation(other.id())?;
        let mut theirs: Vec<AnnotationId> = vec![other.id()];
        theirs.extend(other.ancestors().iter().map(|a| a.id()));
        std::iter::once(*self)
            .chain(self.ancestors())
            .find(|a| theirs.contains(&a.id()))
    }

    /// Live direct children on `layer_id`, by ordinal.
    #[must_use]
    pub fn children(&self, layer_id: &str) -> Vec<AnnotationRef<'g>> {
        let graph = self.graph;
        graph
            .live_siblings(Some(self.annotation.id()), layer_id)
            .map(|a| AnnotationRef::new(graph, a))
            .collect()
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// First related annotation on `layer_id`.
    ///
    /// For cousin layers, an annotation including this one is preferred over
    /// one this includes.
    #[must_use]
    pub fn first(&self, layer_id: &str) -> Option<AnnotationRef<'g>> {
        match self.relation(layer_id) {
            Relation::Cousin => {
                let candidates: Vec<AnnotationRef<'g>> = self.cousin_candidates(layer_id).collect();
                candidates
                    .iter()
                    .find(|c| c.includes(self.annotation))
                    .or_else(|| candidates.iter().find(|c| self.includes(c.annotation)))
                    .copied()
            }
            _ => self.every(layer_id).next(),
        }
    }

    /// All related annotations on `layer_id`.
    #[must_use]
    pub fn all(&self, layer_id: &str) -> Vec<AnnotationRef<'g>> {
        self.every(layer_id).collect()
    }

    /// Ids of all related annotations, detached from the graph borrow.
    #[must_use]
    pub fn list(&self, layer_id: &str) -> Vec<AnnotationId> {
        self.every(layer_id).map(|a| a.id()).collect()
    }

    /// Lazy, restartable iterator over the same results as [`Self::all`].
    #[must_use]
    pub fn every(&self, layer_id: &str) -> Every<'g> {
        let graph = self.graph;
        match self.relation(layer_id) {
            Relation::Unknown => Every::of(graph, Vec::new()),
            Relation::Own => Every::of(graph, vec![self.annotation.id()]),
            Relation::Ancestor => Every::of(
                graph,
                self.ancestor_on(layer_id).map(|a| a.id()).into_iter().collect(),
            ),
            Relation::Descendant => descend(graph, Some(self.annotation), layer_id),
            Relation::Cousin => {
                let me = *self;
                let ids = self
                    .cousin_candidates(layer_id)
                    .filter(|c| me.includes(c.annotation) || c.includes(me.annotation))
                    .map(|c| c.id())
                    .collect();
                Every::of(graph, ids)
            }
        }
    }

    fn relation(&self, layer_id: &str) -> Relation {
        let schema = self.graph.schema();
        let own = self.annotation.layer_id();
        if !schema.contains(layer_id) {
            Relation::Unknown
        } else if layer_id == own {
            Relation::Own
        } else if schema.is_ancestor(layer_id, own) {
            Relation::Ancestor
        } else if schema.is_descendant(layer_id, own) {
            Relation::Descendant
        } else {
            Relation::Cousin
        }
    }

    fn cousin_candidates(&self, layer_id: &str) -> Every<'g> {
        let graph = self.graph;
        let schema = graph.schema();
        let Some(common) = schema.first_common_ancestor(self.annotation.layer_id(), layer_id) else {
            return Every::of(graph, Vec::new());
        };
        if schema.is_root(&common.id) {
            return graph.every(layer_id);
        }
        match self.ancestor_on(&common.id) {
            Some(ancestor) => descend(graph, Some(ancestor.annotation), layer_id),
            None => Every::of(graph, Vec::new()),
        }
    }
}

enum Relation {
    Unknown,
    Own,
    Ancestor,
    Descendant,
    Cousin,
}

// =============================================================================
// Graph-level queries
// =============================================================================

impl Graph {
    /// First annotation on `layer_id` in graph order.
    #[must_use]
    pub fn first(&self, layer_id: &str) -> Option<AnnotationRef<'_>> {
        self.every(layer_id).next()
    }

    /// All live annotations on `layer_id` in graph order.
    #[must_use]
    pub fn all(&self, layer_id: &str) -> Vec<AnnotationRef<'_>> {
        self.every(layer_id).collect()
    }

    /// Ids of all live annotations on `layer_id`, in graph order.
    #[must_use]
    pub fn list(&self, layer_id: &str) -> Vec<AnnotationId> {
        self.every(layer_id).map(|a| a.id()).collect()
    }

    /// Lazy iterator over live annotations on `layer_id` in graph order.
    #[must_use]
    pub fn every(&self, layer_id: &str) -> Every<'_> {
        if self.schema().is_root(layer_id) {
            return Every::of(self, Vec::new());
        }
        descend(self, None, layer_id)
    }

    /// Labels on `layer_id`, in graph order.
    #[must_use]
    pub fn labels(&self, layer_id: &str) -> Vec<&str> {
        self.every(layer_id).map(|a| a.annotation().label()).collect()
    }

    /// Live annotations on `layer_id` intersecting `[start, end)`, by start.
    #[must_use]
    pub fn overlapping(&self, start: f64, end: f64, layer_id: &str) -> Vec<AnnotationRef<'_>> {
        let mut found: Vec<AnnotationRef<'_>> = self
            .annotations()
            .on_layer(layer_id)
            .filter_map(|id| self.annotation(id))
            .filter(|a| a.is_live() && intersects(self, a, start, end))
            .collect();
        found.sort_by(|a, b| cmp_bounds(a.start_bound(), b.start_bound()).then(a.id().cmp(&b.id())));
        found
    }
}

/// True if `annotation`'s span intersects `[start, end)`.
///
/// Zero-width annotations intersect when `start <= offset < end`; unset
/// bounds fall back to the other end.
pub(crate) fn intersects(graph: &Graph, annotation: &Annotation, start: f64, end: f64) -> bool {
    let s = graph.offset_min(annotation.start());
    let e = graph.offset_max(annotation.end());
    let (s, e) = match (s, e) {
        (Some(s), Some(e)) => (s, e),
        (Some(s), None) => (s, s),
        (None, Some(e)) => (e, e),
        (None, None) => return false,
    };
    if s == e {
        start <= s && s < end
    } else {
        s < end && e > start
    }
}

fn cmp_bounds(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(f64::INFINITY).total_cmp(&b.unwrap_or(f64::INFINITY))
}

// =============================================================================
// Lazy traversal
// =============================================================================

/// Lazy, ordered, finite, restartable sequence of annotations.
///
/// Starting points are resolved eagerly; the walk from each starting point
/// down to the target layer happens as the iterator advances.
#[derive(Clone)]
pub struct Every<'g> {
    graph: &'g Graph,
    /// Layers below the starting points, top-down, ending at the target.
    path: Vec<String>,
    /// Starting points with their depth into `path`.
    initial: Vec<(AnnotationId, usize)>,
    stack: Vec<(AnnotationId, usize)>,
}

impl fmt::Debug for Every<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Every")
            .field("path", &self.path)
            .field("remaining_roots", &self.stack.len())
            .finish()
    }
}

impl<'g> Every<'g> {
    fn new(graph: &'g Graph, path: Vec<String>, initial: Vec<(AnnotationId, usize)>) -> Self {
        let stack = initial.iter().rev().copied().collect();
        Self {
            graph,
            path,
            initial,
            stack,
        }
    }

    fn of(graph: &'g Graph, ids: Vec<AnnotationId>) -> Self {
        Self::new(graph, Vec::new(), ids.into_iter().map(|id| (id, 0)).collect())
    }

    /// Rewind to the first element.
    pub fn restart(&mut self) {
        self.stack = self.initial.iter().rev().copied().collect();
    }
}

impl<'g> Iterator for Every<'g> {
    type Item = AnnotationRef<'g>;

    fn next(&mut self) -> Option<Self::Item> {
        let graph = self.graph;
        while let Some((id, depth)) = self.stack.pop() {
            let Some(annotation) = graph.get(id).filter(|a| a.is_live()) else {
                continue;
            };
            if depth == self.path.len() {
                return Some(AnnotationRef::new(graph, annotation));
            }
            let children = graph.annotations().children(Some(id), &self.path[depth]);
            self.stack
                .extend(children.iter().rev().map(|child| (*child, depth + 1)));
        }
        None
    }
}

impl std::iter::FusedIterator for Every<'_> {}

/// Descendants of `scope` (or of the root) on `target`, in time order.
fn descend<'g>(graph: &'g Graph, scope: Option<&'g Annotation>, target: &str) -> Every<'g> {
    let schema = graph.schema();
    let scope_layer = scope.map_or(schema.root_id(), |a| a.layer_id());

    // layers from just below the scope down to the target
    let mut path: Vec<String> = vec![target.to_string()];
    let mut current = target.to_string();
    loop {
        let Some(parent) = schema.layer(&current).and_then(|l| l.parent_id.clone()) else {
            return Every::of(graph, Vec::new());
        };
        if parent == scope_layer {
            break;
        }
        if schema.is_root(&parent) || path.len() > schema.len() {
            return Every::of(graph, Vec::new());
        }
        path.push(parent.clone());
        current = parent;
    }
    path.reverse();

    let pivot = path
        .iter()
        .position(|id| schema.layer(id).map_or(false, |l| l.alignment.is_aligned()))
        .unwrap_or(0);
    let scope_id = scope.map(Annotation::id);
    let orphans = |layer: &str| -> Vec<AnnotationId> {
        if scope.is_some() {
            return Vec::new();
        }
        graph.live_siblings(None, layer).map(Annotation::id).collect()
    };

    let mut level: Vec<AnnotationId> = graph
        .live_siblings(scope_id, &path[0])
        .map(Annotation::id)
        .collect();
    for layer in &path[1..=pivot] {
        let mut next: Vec<AnnotationId> = level
            .iter()
            .flat_map(|id| graph.live_siblings(Some(*id), layer).map(Annotation::id))
            .collect();
        next.extend(orphans(layer));
        level = next;
    }

    let mut initial: Vec<(AnnotationId, usize)> = level.into_iter().map(|id| (id, 0)).collect();
    for (depth, layer) in path.iter().enumerate().skip(pivot + 1) {
        initial.extend(orphans(layer).into_iter().map(|id| (id, depth - pivot)));
    }
    let aligned = schema
        .layer(&path[pivot])
        .map_or(false, |l| l.alignment.is_aligned());
    if aligned {
        let key = |id: &AnnotationId| {
            graph.get(*id).map_or((None, None), |a| {
                (graph.offset_min(a.start()), graph.offset_max(a.end()))
            })
        };
        initial.sort_by(|(a, _), (b, _)| {
            let (ka, kb) = (key(a), key(b));
            cmp_bounds(ka.0, kb.0).then(cmp_bounds(ka.1, kb.1))
        });
    }
    Every::new(graph, path.split_off(pivot + 1), initial)
}
