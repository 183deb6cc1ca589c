//! Benchmarks for graph construction, queries, fragments and batches.
//!
//! # Usage
//!
//! ```bash
//! cargo bench --bench graph
//! ```

use annograph::{json, validate, Confidence, FragmentBatch, Graph, Layer, Schema};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// `utterances` lines of ten 0.3s words each, one speaker.
fn transcript(utterances: usize) -> Graph {
    let mut schema = Schema::conventional();
    schema
        .add_layer(Layer::tag("pos").with_parent("word"))
        .expect("pos layer");
    let mut g = Graph::new("bench.trs", schema);
    let words = utterances * 10;
    let anchors: Vec<_> = (0..=words)
        .map(|i| {
            g.get_or_create_anchor_at(i as f64 * 0.3, Confidence::Manual)
                .expect("anchor")
        })
        .collect();
    let who = g
        .create_annotation("participant", "speaker", anchors[0], anchors[0], None)
        .expect("participant");
    let turn = g
        .create_annotation("turn", "speaker", anchors[0], anchors[words], Some(who))
        .expect("turn");
    for u in 0..utterances {
        g.create_annotation("utterance", "line", anchors[u * 10], anchors[u * 10 + 10], Some(turn))
            .expect("utterance");
    }
    for w in 0..words {
        g.create_annotation("word", format!("w{w}"), anchors[w], anchors[w + 1], Some(turn))
            .expect("word");
    }
    g
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for utterances in [10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(utterances), &utterances, |b, &n| {
            b.iter(|| black_box(transcript(n)));
        });
    }
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let g = transcript(100);
    c.bench_function("labels_word", |b| b.iter(|| black_box(g.labels("word").len())));
    c.bench_function("overlapping_window", |b| {
        b.iter(|| black_box(g.overlapping(black_box(120.0), black_box(150.0), "word").len()))
    });
    c.bench_function("validate", |b| b.iter(|| black_box(validate(&g).len())));
}

fn bench_fragments(c: &mut Criterion) {
    let g = transcript(100);
    c.bench_function("extract_fragment", |b| {
        b.iter(|| black_box(g.extract_fragment(black_box(100.0), black_box(130.0), &["turn", "word"])))
    });
    c.bench_function("batch_tag_words", |b| {
        b.iter(|| {
            let mut g = g.clone();
            let batch = FragmentBatch::per_utterance(&g, vec!["turn".into(), "word".into()]).expect("batch");
            batch
                .run(&mut g, |f| {
                    for w in f.list("word") {
                        f.create_tag(w, "pos", "N")?;
                    }
                    Ok(())
                })
                .expect("run");
            black_box(g)
        })
    });
}

fn bench_json(c: &mut Criterion) {
    let g = transcript(100);
    let text = json::to_string(&g, false).expect("serialize");
    c.bench_function("json_write", |b| b.iter(|| black_box(json::to_string(&g, false))));
    c.bench_function("json_read", |b| b.iter(|| black_box(json::from_str(&text))));
}

criterion_group!(benches, bench_build, bench_queries, bench_fragments, bench_json);
criterion_main!(benches);
