//! Default offsets for boundaries that have none.
//!
//! Splitting an annotation (`insert_after`, `create_subdivision`) leaves the
//! new boundary unset. [`OffsetGenerator`] walks each chain of
//! non-overlapping children inside its parent and spaces unset boundaries
//! evenly between the nearest set ones:
//!
//! ```text
//!   word     1.0 |-------------------------------| 4.0
//!   segment      |    c     |    a     |    t    |
//!               1.0        2.0        3.0       4.0
//!                           ^ generated ^
//! ```
//!
//! An unset boundary that no annotation joins to its set neighbour (the edge
//! of a pause) takes that neighbour's offset instead. Parents are visited
//! top-down, so a word placed inside its turn is itself a bound for its
//! segments.
//!
//! ```rust
//! use annograph::{Confidence, Graph, Layer, OffsetGenerator, Schema};
//!
//! let mut schema = Schema::conventional();
//! schema.add_layer(Layer::interval("segment").with_parent("word").with_peers_overlap(false)).unwrap();
//! let mut g = Graph::new("t", schema);
//! let (a, b) = (g.get_or_create_anchor_at(0.0, Confidence::Manual).unwrap(),
//!               g.get_or_create_anchor_at(2.0, Confidence::Manual).unwrap());
//! let who = g.create_annotation("participant", "p", a, a, None).unwrap();
//! let turn = g.create_annotation("turn", "p", a, b, Some(who)).unwrap();
//! let word = g.create_annotation("word", "ok", a, b, Some(turn)).unwrap();
//! g.create_subdivision(word, "segment", "o").unwrap();
//! let k = g.create_subdivision(word, "segment", "k").unwrap();
//!
//! let summary = OffsetGenerator::new().generate(&mut g).unwrap();
//! assert_eq!(summary.anchors_set, 1);
//! assert_eq!(g.annotation(k).unwrap().start_offset(), Some(1.0));
//! ```

use annograph_core::{Alignment, AnchorId, AnnotationId, Confidence, Graph, Layer};

use crate::error::Result;

/// What a generator run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetSummary {
    /// Anchors given a new offset.
    pub anchors_set: usize,
    /// Parents skipped because their own start or end has no offset.
    pub unresolved: Vec<AnnotationId>,
}

/// Fills in missing offsets by interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetGenerator {
    threshold: Confidence,
    confidence: Confidence,
}

impl Default for OffsetGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl OffsetGenerator {
    /// Anchors with no offset or at [`Confidence::None`] count as unset, and
    /// generated offsets get [`Confidence::None`], so a later run may move
    /// them again.
    #[must_use]
    pub fn new() -> Self {
        Self {
            threshold: Confidence::None,
            confidence: Confidence::None,
        }
    }

    /// Anchors at or below `threshold` count as unset.
    #[must_use]
    pub fn with_threshold(mut self, threshold: Confidence) -> Self {
        self.threshold = threshold;
        self
    }

    /// Confidence given to generated offsets.
    #[must_use]
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Interpolate every unset anchor that lies inside a chain.
    pub fn generate(&self, graph: &mut Graph) -> Result<OffsetSummary> {
        let chains: Vec<(String, String)> = graph
            .schema()
            .top_down()
            .into_iter()
            .filter(|layer| is_chain(graph, layer))
            .filter_map(|layer| Some((layer.parent_id.clone()?, layer.id.clone())))
            .collect();

        let mut summary = OffsetSummary::default();
        for (parent_layer, layer) in &chains {
            for parent in graph.list(parent_layer) {
                match self.fill(graph, parent, layer)? {
                    Some(set) => summary.anchors_set += set,
                    None => {
                        log::warn!("{parent}: no bounds to place its '{layer}' boundaries between");
                        if !summary.unresolved.contains(&parent) {
                            summary.unresolved.push(parent);
                        }
                    }
                }
            }
        }
        log::debug!(
            "{}: generated {} offsets over {} chains",
            graph.id(),
            summary.anchors_set,
            chains.len()
        );
        Ok(summary)
    }

    /// Fill the chain of `layer` children under `parent`. `None` when the
    /// chain needs bounds the parent lacks.
    fn fill(&self, graph: &mut Graph, parent: AnnotationId, layer: &str) -> Result<Option<usize>> {
        let (start, end) = {
            let p = graph.require(parent)?;
            (p.start(), p.end())
        };
        let mut chain = vec![start];
        for child in graph.annotations().children(Some(parent), layer) {
            let Some(child) = graph.get(*child).filter(|c| c.is_live()) else {
                continue;
            };
            for anchor in [child.start(), child.end()] {
                if chain.last() != Some(&anchor) {
                    chain.push(anchor);
                }
            }
        }
        if chain.last() != Some(&end) {
            chain.push(end);
        }

        if chain.len() < 3 {
            return Ok(Some(0));
        }
        let last = chain.len() - 1;
        let known: Vec<bool> = chain
            .iter()
            .enumerate()
            .map(|(i, &a)| {
                if i == 0 || i == last {
                    graph.offset(a).is_some()
                } else {
                    self.is_set(graph, a)
                }
            })
            .collect();
        if known[1..last].iter().all(|k| *k) {
            return Ok(Some(0));
        }
        if !known[0] || !known[last] {
            return Ok(None);
        }

        let mut set = 0;
        let (mut before, mut i) = (0, 1);
        while i < last {
            if known[i] {
                before = i;
                i += 1;
                continue;
            }
            let mut after = i;
            while !known[after] {
                after += 1;
            }
            set += self.spread(graph, chain[before], &chain[i..after], chain[after])?;
            before = after;
            i = after + 1;
        }
        Ok(Some(set))
    }

    fn spread(&self, graph: &mut Graph, before: AnchorId, unset: &[AnchorId], after: AnchorId) -> Result<usize> {
        let (Some(lo), Some(hi)) = (graph.offset(before), graph.offset(after)) else {
            return Ok(0);
        };
        let mut set = 0;
        let mut run = unset;
        if let Some((&first, rest)) = run.split_first() {
            if !joined(graph, before, first) {
                set += self.place(graph, first, lo)?;
                run = rest;
            }
        }
        if let Some((&last, rest)) = run.split_last() {
            if !joined(graph, last, after) {
                set += self.place(graph, last, hi)?;
                run = rest;
            }
        }
        let step = (hi - lo) / (run.len() + 1) as f64;
        for (k, &anchor) in run.iter().enumerate() {
            set += self.place(graph, anchor, lo + step * (k + 1) as f64)?;
        }
        Ok(set)
    }

    fn place(&self, graph: &mut Graph, anchor: AnchorId, offset: f64) -> Result<usize> {
        let current = graph.anchor(anchor).map(|a| (a.offset(), a.confidence()));
        if current == Some((Some(offset), self.confidence)) {
            return Ok(0);
        }
        Ok(usize::from(graph.set_anchor_offset(anchor, Some(offset), self.confidence)?))
    }

    fn is_set(&self, graph: &Graph, anchor: AnchorId) -> bool {
        graph
            .anchor(anchor)
            .is_some_and(|a| a.offset().is_some() && a.confidence() > self.threshold)
    }
}

/// Children that tile their interval parent in order.
fn is_chain(graph: &Graph, layer: &Layer) -> bool {
    let schema = graph.schema();
    layer.peers
        && !layer.peers_overlap
        && layer.parent_includes
        && layer.alignment == Alignment::Interval
        && schema
            .parent(&layer.id)
            .is_some_and(|p| !schema.is_root(&p.id) && p.alignment == Alignment::Interval)
}

/// True if a live annotation runs from `start` to `end`.
fn joined(graph: &Graph, start: AnchorId, end: AnchorId) -> bool {
    graph
        .annotations()
        .starting_at(start)
        .filter_map(|id| graph.get(id))
        .any(|a| a.is_live() && a.end() == end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use annograph_core::Schema;

    /// Turn [0,10] holding a word "cat" [1,4] split into three segments.
    fn subdivided() -> (Graph, AnnotationId) {
        let mut schema = Schema::conventional();
        schema
            .add_layer(Layer::interval("segment").with_parent("word").with_peers_overlap(false))
            .unwrap();
        let mut g = Graph::new("cat.trs", schema);
        let at = |g: &mut Graph, o: f64| g.get_or_create_anchor_at(o, Confidence::Manual).unwrap();
        let (a0, a10) = (at(&mut g, 0.0), at(&mut g, 10.0));
        let who = g.create_annotation("participant", "p", a0, a0, None).unwrap();
        let turn = g.create_annotation("turn", "p", a0, a10, Some(who)).unwrap();
        let (s, e) = (at(&mut g, 1.0), at(&mut g, 4.0));
        let word = g.create_annotation("word", "cat", s, e, Some(turn)).unwrap();
        for piece in ["c", "a", "t"] {
            g.create_subdivision(word, "segment", piece).unwrap();
        }
        (g, word)
    }

    fn segment_bounds(g: &Graph, word: AnnotationId) -> Vec<(Option<f64>, Option<f64>)> {
        g.annotation(word)
            .unwrap()
            .children("segment")
            .iter()
            .map(|s| (s.start_offset(), s.end_offset()))
            .collect()
    }

    #[test]
    fn subdivided_token_spaced_evenly() {
        let (mut g, word) = subdivided();
        assert_eq!(segment_bounds(&g, word)[1], (None, None));

        let summary = OffsetGenerator::new().generate(&mut g).unwrap();
        assert_eq!(summary.anchors_set, 2);
        assert!(summary.unresolved.is_empty());
        assert_eq!(
            segment_bounds(&g, word),
            vec![(Some(1.0), Some(2.0)), (Some(2.0), Some(3.0)), (Some(3.0), Some(4.0))]
        );
        assert!(!crate::has_errors(&crate::validate(&g)));
    }

    #[test]
    fn second_run_changes_nothing() {
        let (mut g, _) = subdivided();
        let generator = OffsetGenerator::new();
        generator.generate(&mut g).unwrap();
        assert_eq!(generator.generate(&mut g).unwrap().anchors_set, 0);
    }

    #[test]
    fn generated_confidence_applied() {
        let (mut g, word) = subdivided();
        OffsetGenerator::new()
            .with_confidence(Confidence::Automatic)
            .generate(&mut g)
            .unwrap();
        let middle = g.annotation(word).unwrap().children("segment")[1].start();
        assert_eq!(g.anchor(middle).unwrap().confidence(), Confidence::Automatic);
        // manual word boundaries stay put
        assert_eq!(g.anchor_at(1.0).map(|a| g.anchor(a).unwrap().confidence()), Some(Confidence::Manual));
    }

    #[test]
    fn inserted_sibling_split_at_midpoint() {
        let (mut g, word) = subdivided();
        OffsetGenerator::new()
            .with_confidence(Confidence::Automatic)
            .generate(&mut g)
            .unwrap();
        let first = g.annotation(word).unwrap().children("segment")[0].id();
        let extra = g.insert_after(first, "h").unwrap();
        assert_eq!(g.annotation(extra).unwrap().start_offset(), None);

        OffsetGenerator::new().generate(&mut g).unwrap();
        assert_eq!(g.annotation(extra).unwrap().start_offset(), Some(1.5));
        assert_eq!(g.annotation(extra).unwrap().end_offset(), Some(2.0));
    }

    #[test]
    fn weak_offsets_respaced() {
        let (mut g, word) = subdivided();
        OffsetGenerator::new().generate(&mut g).unwrap();
        let first = g.annotation(word).unwrap().children("segment")[0].id();
        g.insert_after(first, "h").unwrap();

        // the earlier guesses are still unset at the default threshold
        OffsetGenerator::new().generate(&mut g).unwrap();
        let starts: Vec<Option<f64>> = segment_bounds(&g, word).iter().map(|b| b.0).collect();
        assert_eq!(starts, vec![Some(1.0), Some(1.75), Some(2.5), Some(3.25)]);
    }
}
