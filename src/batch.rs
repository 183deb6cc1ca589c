//! Parallel processing of one graph as independent fragments.
//!
//! ```text
//!   source graph ──extract──► fragment per utterance ──par map──► tracked edits
//!        ▲                                                              │
//!        └──────────────── apply_fragment_changes (in time order) ◄─────┘
//! ```
//!
//! Fragments share nothing, so workers need no locking; merging happens on
//! the calling thread after all workers finish, into a copy of the source
//! that replaces it only if every fragment applies. A failed fragment
//! leaves the source untouched.
//!
//! An annotation crossing a window boundary lands in both fragments. It
//! belongs to the fragment its start offset falls in, and edits the other
//! fragment made to it (or under it) are dropped.

use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use annograph_core::{AnnotationId, ChangeKind, Graph, Role};

use crate::annotator::Annotator;
use crate::error::{Error, Result};
use crate::sync::{into_inner, lock, Mutex};

/// What a batch did to its source graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Fragments merged back.
    pub fragments: usize,
    /// Annotations added to the source.
    pub annotations_created: usize,
    /// Anchors added to the source.
    pub anchors_created: usize,
    /// True if the run stopped early; finished fragments were still merged.
    pub cancelled: bool,
}

/// One fragment per annotation on a defining layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentBatch {
    defining_layer: String,
    layer_ids: Vec<String>,
}

impl FragmentBatch {
    /// Fragments around each annotation on `defining_layer`, holding
    /// `layer_ids`.
    #[must_use]
    pub fn new(defining_layer: impl Into<String>, layer_ids: Vec<String>) -> Self {
        Self {
            defining_layer: defining_layer.into(),
            layer_ids,
        }
    }

    /// Fragments per utterance (the schema's utterance role).
    pub fn per_utterance(graph: &Graph, layer_ids: Vec<String>) -> Result<Self> {
        let utterance = graph
            .schema()
            .role_id(Role::Utterance)
            .ok_or_else(|| Error::configuration("schema has no utterance layer"))?;
        Ok(Self::new(utterance, layer_ids))
    }

    /// Layer the fragments are cut around.
    #[must_use]
    pub fn defining_layer(&self) -> &str {
        &self.defining_layer
    }

    /// Layers copied into each fragment.
    #[must_use]
    pub fn layer_ids(&self) -> &[String] {
        &self.layer_ids
    }

    /// Extract the fragments, with change tracking on.
    pub fn extract(&self, graph: &Graph) -> Result<Vec<Graph>> {
        graph.schema().require(&self.defining_layer)?;
        let layers: Vec<&str> = self.layer_ids.iter().map(String::as_str).collect();
        let defining: Vec<AnnotationId> = graph.list(&self.defining_layer);
        let mut fragments = Vec::with_capacity(defining.len());
        for id in defining {
            let mut fragment = graph.fragment_of(id, &layers)?;
            fragment.track_changes();
            fragments.push(fragment);
        }
        log::debug!(
            "{}: {} fragments on '{}'",
            graph.id(),
            fragments.len(),
            self.defining_layer
        );
        Ok(fragments)
    }

    /// Run `pass` on every fragment in parallel, then merge the results.
    pub fn run<F>(&self, graph: &mut Graph, pass: F) -> Result<BatchSummary>
    where
        F: Fn(&mut Graph) -> Result<()> + Send + Sync,
    {
        let fragments = self.extract(graph)?;
        let processed: Vec<Graph> = fragments
            .into_par_iter()
            .map(|mut fragment| {
                pass(&mut fragment).map_err(|e| e.in_fragment(&fragment))?;
                Ok(fragment)
            })
            .collect::<Result<_>>()?;
        merge(graph, processed, false)
    }

    /// Run an annotator over every fragment, then merge the results.
    ///
    /// Output layers missing from `graph` are added first. On cancellation
    /// the fragments that finished are merged and the summary says so.
    pub fn run_annotator<A: Annotator>(&self, graph: &mut Graph, annotator: &A) -> Result<BatchSummary> {
        annotator.prepare_graph(graph)?;
        let fragments = self.extract(graph)?;
        let total = fragments.len();
        let finished = Mutex::new(Vec::with_capacity(total));
        let cancelled = match annotator.transform_fragments(fragments, |f| lock(&finished).push(f)) {
            Ok(_) => false,
            Err(Error::Cancelled) => true,
            Err(e) => return Err(e),
        };
        let finished = into_inner(finished);
        if cancelled {
            log::info!(
                "{}: cancelled after {} of {total} fragments",
                annotator.id(),
                finished.len()
            );
        }
        merge(graph, finished, cancelled)
    }
}

fn merge(graph: &mut Graph, mut fragments: Vec<Graph>, cancelled: bool) -> Result<BatchSummary> {
    fragments.sort_by(|a, b| {
        let (sa, sb) = (a.source().map(|s| s.start), b.source().map(|s| s.start));
        sa.unwrap_or(f64::INFINITY)
            .total_cmp(&sb.unwrap_or(f64::INFINITY))
            .then_with(|| a.id().cmp(b.id()))
    });
    let owners = owners(graph, &fragments);
    let mut summary = BatchSummary {
        cancelled,
        ..BatchSummary::default()
    };
    let mut merged = graph.clone();
    for (i, fragment) in fragments.iter().enumerate() {
        let map = merged
            .apply_owned_fragment_changes(fragment, |id| owners.get(&id).map_or(true, |&(owner, _)| owner == i))
            .map_err(|e| Error::from(e).in_fragment(fragment))?;
        summary.fragments += 1;
        summary.annotations_created += map.annotations.len();
        summary.anchors_created += map.anchors.len();
    }
    *graph = merged;
    log::info!(
        "{}: merged {} fragments ({} annotations created)",
        graph.id(),
        summary.fragments,
        summary.annotations_created
    );
    Ok(summary)
}

/// Owning fragment for every pre-existing annotation the fragments hold.
///
/// The first fragment whose window contains the annotation's start wins;
/// failing that, the first fragment holding it. The flag records which.
fn owners(graph: &Graph, fragments: &[Graph]) -> HashMap<AnnotationId, (usize, bool)> {
    let mut owners = HashMap::new();
    for (i, fragment) in fragments.iter().enumerate() {
        let Some(window) = fragment.source() else {
            continue;
        };
        for annotation in fragment.annotations().iter() {
            if annotation.change() == ChangeKind::Create {
                continue;
            }
            let starts_here = graph
                .get(annotation.id())
                .and_then(|a| graph.offset_min(a.start()))
                .is_some_and(|s| window.start <= s && s < window.end);
            match owners.entry(annotation.id()) {
                Entry::Vacant(slot) => {
                    slot.insert((i, starts_here));
                }
                Entry::Occupied(mut slot) => {
                    if starts_here && !slot.get().1 {
                        slot.insert((i, true));
                    }
                }
            }
        }
    }
    owners
}

#[cfg(test)]
mod tests {
    use super::*;
    use annograph_core::{Confidence, Layer, Schema};

    /// One turn with two utterances of two words each.
    fn transcript() -> Graph {
        let mut schema = Schema::conventional();
        schema.add_layer(Layer::tag("pos").with_parent("word")).unwrap();
        let mut g = Graph::new("t.trs", schema);
        let at = |g: &mut Graph, o: f64| g.get_or_create_anchor_at(o, Confidence::Manual).unwrap();
        let (a0, a10) = (at(&mut g, 0.0), at(&mut g, 10.0));
        let who = g.create_annotation("participant", "p", a0, a0, None).unwrap();
        let turn = g.create_annotation("turn", "p", a0, a10, Some(who)).unwrap();
        for (line, words) in [((0.0, 5.0), [(0.0, 2.0), (2.0, 4.0)]), ((5.0, 10.0), [(5.0, 7.0), (7.0, 9.0)])] {
            let (s, e) = (at(&mut g, line.0), at(&mut g, line.1));
            g.create_annotation("utterance", "line", s, e, Some(turn)).unwrap();
            for (ws, we) in words {
                let (s, e) = (at(&mut g, ws), at(&mut g, we));
                g.create_annotation("word", "w", s, e, Some(turn)).unwrap();
            }
        }
        g
    }

    fn layers() -> Vec<String> {
        vec!["turn".into(), "word".into()]
    }

    #[test]
    fn one_fragment_per_utterance() {
        let g = transcript();
        let batch = FragmentBatch::per_utterance(&g, layers()).unwrap();
        let fragments = batch.extract(&g).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments.iter().all(|f| f.is_tracking() && f.labels("word").len() == 2));
        assert_eq!(fragments[1].id(), "t.trs__5-10");
    }

    #[test]
    fn run_merges_created_tags() {
        let mut g = transcript();
        let batch = FragmentBatch::per_utterance(&g, layers()).unwrap();
        let summary = batch
            .run(&mut g, |f| {
                for w in f.list("word") {
                    f.create_tag(w, "pos", "N")?;
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(summary.fragments, 2);
        assert_eq!(summary.annotations_created, 4);
        assert_eq!(summary.anchors_created, 0);
        assert_eq!(g.labels("pos"), vec!["N"; 4]);
    }

    #[test]
    fn failure_leaves_source_untouched() {
        let mut g = transcript();
        let before = g.annotations().len();
        let batch = FragmentBatch::per_utterance(&g, layers()).unwrap();
        let err = batch
            .run(&mut g, |f| {
                let w = f.list("word")[0];
                f.create_tag(w, "pos", "N")?;
                Err(annograph_core::Error::transformation("aligner gave up").into())
            })
            .unwrap_err();
        match err {
            Error::Transformation { context, .. } => {
                assert!(context.graph_id.unwrap().starts_with("t.trs__"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(g.annotations().len(), before);
    }

    /// Utterances [0,5] and [5,10] with a word [4,6] crossing between them.
    fn straddling() -> Graph {
        let mut schema = Schema::conventional();
        schema.add_layer(Layer::tag("pos").with_parent("word")).unwrap();
        let mut g = Graph::new("s.trs", schema);
        let at = |g: &mut Graph, o: f64| g.get_or_create_anchor_at(o, Confidence::Manual).unwrap();
        let (a0, a10) = (at(&mut g, 0.0), at(&mut g, 10.0));
        let who = g.create_annotation("participant", "p", a0, a0, None).unwrap();
        let turn = g.create_annotation("turn", "p", a0, a10, Some(who)).unwrap();
        for (s, e) in [(0.0, 5.0), (5.0, 10.0)] {
            let (s, e) = (at(&mut g, s), at(&mut g, e));
            g.create_annotation("utterance", "line", s, e, Some(turn)).unwrap();
        }
        for (label, s, e) in [("a", 0.0, 4.0), ("b", 4.0, 6.0), ("c", 6.0, 10.0)] {
            let (s, e) = (at(&mut g, s), at(&mut g, e));
            g.create_annotation("word", label, s, e, Some(turn)).unwrap();
        }
        g
    }

    fn tag_words(f: &mut Graph) -> Result<()> {
        for w in f.list("word") {
            let label = f.require(w)?.label().to_uppercase();
            f.create_tag(w, "pos", label)?;
        }
        Ok(())
    }

    #[test]
    fn straddling_word_tagged_once() {
        let mut g = straddling();
        let batch = FragmentBatch::per_utterance(&g, layers()).unwrap();
        let fragments = batch.extract(&g).unwrap();
        assert!(fragments.iter().all(|f| f.labels("word").contains(&"b")));

        let summary = batch.run(&mut g, tag_words).unwrap();
        assert_eq!(summary.annotations_created, 3);
        assert_eq!(g.labels("pos"), vec!["A", "B", "C"]);
        for word in g.all("word") {
            assert_eq!(word.children("pos").len(), 1, "{}", word.label());
        }
    }

    #[test]
    fn failed_merge_leaves_source_untouched() {
        let mut g = straddling();
        let before = (g.annotations().len(), g.anchors().len());
        let batch = FragmentBatch::per_utterance(&g, layers()).unwrap();
        let err = batch
            .run(&mut g, |f| {
                tag_words(f)?;
                if f.source().is_some_and(|s| s.start >= 5.0) {
                    // no turn covers this, so it cannot be placed in the source
                    let s = f.get_or_create_anchor_at(20.0, Confidence::Automatic)?;
                    let e = f.get_or_create_anchor_at(21.0, Confidence::Automatic)?;
                    f.create_annotation("word", "stray", s, e, None)?;
                }
                Ok(())
            })
            .unwrap_err();
        match err {
            Error::Transformation { context, .. } => {
                assert_eq!(context.graph_id.as_deref(), Some("s.trs__5-10"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!((g.annotations().len(), g.anchors().len()), before);
        assert!(g.labels("pos").is_empty());
    }

    #[test]
    fn unknown_defining_layer() {
        let g = transcript();
        let batch = FragmentBatch::new("sentence", layers());
        assert!(batch.extract(&g).unwrap_err().is_configuration());
    }
}
