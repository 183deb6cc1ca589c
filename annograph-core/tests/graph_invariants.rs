//! Property-based tests for the graph model's structural guarantees.

use annograph_core::{AnnotationId, ChangeKind, Confidence, FragmentId, Graph, Layer, Schema};
use proptest::prelude::*;

fn confidence_strategy() -> impl Strategy<Value = Confidence> {
    prop::sample::select(Confidence::ALL.to_vec())
}

/// Strictly increasing cut points, on a 0.01 grid so they compare exactly.
fn cuts_strategy(max: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::btree_set(0u32..100_000, 2..max)
        .prop_map(|set| set.into_iter().map(|c| f64::from(c) / 100.0).collect())
}

fn schema() -> Schema {
    let mut s = Schema::conventional();
    s.add_layer(Layer::tag("pos").with_parent("word")).unwrap();
    s
}

/// One participant with one turn spanning `[0, end]`.
fn skeleton(end: f64) -> (Graph, AnnotationId) {
    let mut g = Graph::new("prop", schema());
    let a = g.get_or_create_anchor_at(0.0, Confidence::Manual).unwrap();
    let b = g.get_or_create_anchor_at(end, Confidence::Manual).unwrap();
    let who = g.create_annotation("participant", "p", a, a, None).unwrap();
    let turn = g.create_annotation("turn", "p", a, b, Some(who)).unwrap();
    (g, turn)
}

/// Words between consecutive cuts.
fn tokenized(cuts: &[f64]) -> (Graph, Vec<AnnotationId>) {
    let end = cuts.last().copied().unwrap_or(0.0).max(1.0);
    let (mut g, turn) = skeleton(end);
    let mut words = Vec::new();
    for (i, pair) in cuts.windows(2).enumerate() {
        let s = g.get_or_create_anchor_at(pair[0], Confidence::Default).unwrap();
        let e = g.get_or_create_anchor_at(pair[1], Confidence::Default).unwrap();
        words.push(g.create_annotation("word", format!("w{i}"), s, e, Some(turn)).unwrap());
    }
    (g, words)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// INVARIANT: at most one live anchor per offset, holding the highest
    /// confidence ever requested for it.
    #[test]
    fn one_anchor_per_offset(
        requests in prop::collection::vec((0u8..20, confidence_strategy()), 1..60),
    ) {
        let mut g = Graph::new("anchors", Schema::conventional());
        let mut best = std::collections::HashMap::new();
        for (slot, confidence) in &requests {
            let offset = f64::from(*slot) * 0.5;
            g.get_or_create_anchor_at(offset, *confidence).unwrap();
            let entry = best.entry(*slot).or_insert(*confidence);
            *entry = (*entry).max(*confidence);
        }
        prop_assert_eq!(g.anchors().len(), best.len());
        for (slot, confidence) in best {
            let id = g.anchor_at(f64::from(slot) * 0.5).unwrap();
            prop_assert_eq!(g.anchor(id).unwrap().confidence(), confidence);
        }
    }

    /// INVARIANT: words tiling a turn share their boundary anchors.
    #[test]
    fn adjacent_words_share_boundaries(cuts in cuts_strategy(30)) {
        let (g, words) = tokenized(&cuts);
        for pair in words.windows(2) {
            prop_assert_eq!(g.get(pair[0]).unwrap().end(), g.get(pair[1]).unwrap().start());
        }
        let expected = words.len() + 1;
        let used: std::collections::HashSet<_> = words
            .iter()
            .flat_map(|w| {
                let w = g.get(*w).unwrap();
                [w.start(), w.end()]
            })
            .collect();
        prop_assert_eq!(used.len(), expected);
    }

    /// INVARIANT: tags are zero-width on their target's start and add no anchors.
    #[test]
    fn tags_add_no_anchors(cuts in cuts_strategy(20)) {
        let (mut g, words) = tokenized(&cuts);
        let before = g.anchors().len();
        for word in &words {
            let tag = g.create_tag(*word, "pos", "X").unwrap();
            let tag = g.get(tag).unwrap();
            prop_assert!(tag.is_zero_width());
            prop_assert_eq!(tag.start(), g.get(*word).unwrap().start());
            prop_assert_eq!(tag.parent(), Some(*word));
        }
        prop_assert_eq!(g.anchors().len(), before);
    }

    /// INVARIANT: accepted words on a no-overlap layer never strictly overlap.
    #[test]
    fn no_overlap_layer_stays_disjoint(
        spans in prop::collection::vec((0u32..100, 1u32..20), 1..40),
    ) {
        let (mut g, turn) = skeleton(200.0);
        for (start, len) in spans {
            let s = g.get_or_create_anchor_at(f64::from(start), Confidence::Default).unwrap();
            let e = g.get_or_create_anchor_at(f64::from(start + len), Confidence::Default).unwrap();
            let _ = g.create_annotation("word", "w", s, e, Some(turn));
        }
        let words = g.all("word");
        for (i, a) in words.iter().enumerate() {
            for b in &words[i + 1..] {
                prop_assert!(!a.overlaps(b.annotation()), "{:?} overlaps {:?}", a, b);
            }
        }
    }

    /// INVARIANT: ordinals among siblings are 1..=n in creation order.
    #[test]
    fn ordinals_follow_creation(cuts in cuts_strategy(25)) {
        let (g, words) = tokenized(&cuts);
        for (i, word) in words.iter().enumerate() {
            prop_assert_eq!(g.get(*word).unwrap().ordinal() as usize, i + 1);
        }
    }

    /// INVARIANT: after commit nothing is tagged and destroyed subtrees are gone.
    #[test]
    fn commit_sweeps_destroyed(
        cuts in cuts_strategy(20),
        doomed in prop::collection::vec(any::<bool>(), 20),
    ) {
        let (mut g, words) = tokenized(&cuts);
        g.track_changes();
        for word in &words {
            g.create_tag(*word, "pos", "X").unwrap();
        }
        let mut removed = 0;
        for (word, kill) in words.iter().zip(&doomed) {
            if *kill {
                removed += g.destroy(*word).unwrap();
            }
        }
        let total = g.annotations().len();
        g.commit();
        prop_assert_eq!(g.annotations().len(), total - removed);
        prop_assert!(g.annotations().iter().all(|a| a.change() == ChangeKind::Unchanged));
        prop_assert!(g.tracker().unwrap().is_empty());
        prop_assert_eq!(g.labels("pos").len(), g.labels("word").len());
    }

    /// INVARIANT: a fragment holds exactly the source words intersecting its window.
    #[test]
    fn fragment_matches_window(cuts in cuts_strategy(30), a in 0u32..1000, b in 0u32..1000) {
        let (g, _) = tokenized(&cuts);
        let (start, end) = (f64::from(a.min(b)), f64::from(a.max(b)));
        let fragment = g.extract_fragment(start, end, &["word"]).unwrap();
        let expected: Vec<AnnotationId> = g
            .overlapping(start, end, "word")
            .iter()
            .map(|w| w.id())
            .collect();
        let mut got: Vec<AnnotationId> = fragment.list("word");
        got.sort();
        let mut expected_sorted = expected.clone();
        expected_sorted.sort();
        prop_assert_eq!(got, expected_sorted);
        let id: FragmentId = fragment.id().parse().unwrap();
        prop_assert_eq!(id.graph_id.as_str(), g.id());
        prop_assert_eq!((id.start, id.end), (start, end));
    }

    /// INVARIANT: fragment ids parse back to the numbers that built them.
    #[test]
    fn fragment_id_offsets_survive_formatting(
        name in "[a-z][a-z0-9_.]{0,12}",
        start in 0.0f64..1e6,
        len in 0.0f64..1e4,
    ) {
        let id = FragmentId::new(name.clone(), start, start + len);
        let parsed = FragmentId::parse(&id.to_string()).unwrap();
        prop_assert_eq!(parsed.start, start);
        prop_assert_eq!(parsed.end, start + len);
        prop_assert_eq!(parsed.graph_id, name);
    }
}

