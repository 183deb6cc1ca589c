//! Shared strategy generators for property-based testing.

#![allow(dead_code)]

use annograph::{Confidence, Graph, Layer, Schema};
use proptest::prelude::*;

/// Strictly increasing word boundaries on a 10ms grid, starting at 0.
pub fn cuts_strategy() -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec(1u32..200, 2..16).prop_map(|steps| {
        let mut at = 0u32;
        let mut cuts = vec![0.0];
        for step in steps {
            at += step;
            cuts.push(f64::from(at) / 100.0);
        }
        cuts
    })
}

/// Lowercase word labels.
pub fn label_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

/// Word boundaries, one label per word, and utterance length in words.
pub fn transcript_strategy() -> impl Strategy<Value = (Vec<f64>, Vec<String>, usize)> {
    cuts_strategy().prop_flat_map(|cuts| {
        let words = cuts.len() - 1;
        (
            Just(cuts),
            proptest::collection::vec(label_strategy(), words),
            1usize..4,
        )
    })
}

/// Conventional schema plus a `pos` tag layer under words.
pub fn schema() -> Schema {
    let mut schema = Schema::conventional();
    schema
        .add_layer(Layer::tag("pos").with_parent("word"))
        .expect("pos layer");
    schema
}

/// One participant, one turn over all cuts, consecutive words, and
/// utterances of `per_utterance` words each.
pub fn build_transcript(cuts: &[f64], labels: &[String], per_utterance: usize) -> Graph {
    let mut g = Graph::new("prop.trs", schema());
    let anchors: Vec<_> = cuts
        .iter()
        .map(|&c| g.get_or_create_anchor_at(c, Confidence::Manual).expect("anchor"))
        .collect();
    let first = anchors[0];
    let last = anchors[anchors.len() - 1];
    let who = g
        .create_annotation("participant", "speaker", first, first, None)
        .expect("participant");
    let turn = g
        .create_annotation("turn", "speaker", first, last, Some(who))
        .expect("turn");
    for (i, label) in labels.iter().enumerate() {
        g.create_annotation("word", label.as_str(), anchors[i], anchors[i + 1], Some(turn))
            .expect("word");
    }
    for start in (0..labels.len()).step_by(per_utterance) {
        let end = (start + per_utterance).min(labels.len());
        g.create_annotation("utterance", "line", anchors[start], anchors[end], Some(turn))
            .expect("utterance");
    }
    g
}
