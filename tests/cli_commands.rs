//! Tests for the annograph CLI: fragment-id, inspect, validate, extract

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use annograph::{json, Confidence, Graph, Schema};

fn sample_graph() -> Graph {
    let mut g = Graph::new("sample.trs", Schema::conventional());
    let at = |g: &mut Graph, o: f64| g.get_or_create_anchor_at(o, Confidence::Manual).unwrap();
    let (a0, a10) = (at(&mut g, 0.0), at(&mut g, 10.0));
    let who = g.create_annotation("participant", "ann", a0, a0, None).unwrap();
    let turn = g.create_annotation("turn", "ann", a0, a10, Some(who)).unwrap();
    g.create_annotation("utterance", "line", a0, a10, Some(turn)).unwrap();
    for (label, s, e) in [("one", 1.0, 2.0), ("two", 2.0, 4.0), ("three", 6.0, 8.0)] {
        let (s, e) = (at(&mut g, s), at(&mut g, e));
        g.create_annotation("word", label, s, e, Some(turn)).unwrap();
    }
    g
}

fn setup_graph_file(graph: &Graph) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("graph.json");
    fs::write(&path, json::to_string(graph, true).unwrap()).expect("Failed to write graph");
    (dir, path)
}

fn annograph() -> Command {
    Command::cargo_bin("annograph").unwrap()
}

#[test]
fn test_fragment_id_format() {
    annograph()
        .args(["fragment-id", "format", "sample.trs", "1.5", "3"])
        .assert()
        .success()
        .stdout("sample.trs__1.5-3\n");
}

#[test]
fn test_fragment_id_format_negative_with_extension() {
    annograph()
        .args(["fragment-id", "format", "sample.trs", "-0.5", "2", "--extension", "wav"])
        .assert()
        .success()
        .stdout("sample.trs__-0.5-2.wav\n");
}

#[test]
fn test_fragment_id_parse_json() {
    annograph()
        .args(["fragment-id", "parse", "a__b.trs__10-20.wav", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"graph_id\": \"a__b.trs\""))
        .stdout(predicate::str::contains("\"extension\": \".wav\""));
}

#[test]
fn test_fragment_id_parse_rejects_garbage() {
    annograph()
        .args(["fragment-id", "parse", "no-window-here"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-window-here"));
}

#[test]
fn test_inspect_lists_layers() {
    let (_dir, path) = setup_graph_file(&sample_graph());
    annograph()
        .args(["inspect", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("graph: sample.trs"))
        .stdout(predicate::str::contains("anchors: 7 (7 with offsets)"))
        .stdout(predicate::str::is_match(r"(?m)^\s+word\s+interval\s+turn\s+3$").unwrap());
}

#[test]
fn test_inspect_json() {
    let (_dir, path) = setup_graph_file(&sample_graph());
    let output = annograph()
        .args(["inspect", "--format", "json", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["id"], "sample.trs");
    assert_eq!(summary["layers"].as_array().unwrap().len(), 4);
}

#[test]
fn test_inspect_missing_file() {
    annograph()
        .args(["inspect", "/definitely/not/here.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_validate_clean_graph() {
    let (_dir, path) = setup_graph_file(&sample_graph());
    annograph()
        .args(["validate", "--errors-only", path.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("0 errors"));
}

#[test]
fn test_validate_reports_broken_graph() {
    let mut g = sample_graph();
    let two = g.all("word")[1].id();
    let end = g.get(two).unwrap().end();
    g.set_anchor_offset(end, Some(12.0), Confidence::Manual).unwrap();
    let (_dir, path) = setup_graph_file(&g);

    annograph()
        .args(["validate", path.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("error:"))
        .stdout(predicate::str::contains("outside its parent"))
        .stderr(predicate::str::contains("is invalid"));
}

#[test]
fn test_extract_window_to_file() {
    let (dir, path) = setup_graph_file(&sample_graph());
    let out = dir.path().join("fragment.json");
    annograph()
        .args([
            "extract",
            path.to_str().unwrap(),
            "--start",
            "1",
            "--end",
            "5",
            "--layer",
            "word",
            "--output",
            out.to_str().unwrap(),
            "--quiet",
        ])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());

    let fragment = json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(fragment.id(), "sample.trs__1-5");
    assert_eq!(fragment.labels("word"), vec!["one", "two"]);
    assert!(fragment.is_fragment());
}

#[test]
fn test_extract_unknown_layer_fails() {
    let (_dir, path) = setup_graph_file(&sample_graph());
    annograph()
        .args(["extract", path.to_str().unwrap(), "-s", "0", "-e", "5", "-l", "sentence"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sentence"));
}
