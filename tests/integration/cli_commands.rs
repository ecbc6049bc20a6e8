#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn store_path() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("graph.json");
    (dir, path)
}

fn run_ok(store: &Path, args: &[&str]) -> String {
    let output = cargo_bin_cmd!("kvgraph")
        .arg("--store")
        .arg(store)
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output).expect("utf8 stdout")
}

fn run_json(store: &Path, args: &[&str]) -> Value {
    let mut full = vec!["--format", "json"];
    full.extend_from_slice(args);
    serde_json::from_str(&run_ok(store, &full)).expect("json output")
}

fn run_err(store: &Path, args: &[&str]) -> String {
    let output = cargo_bin_cmd!("kvgraph")
        .arg("--store")
        .arg(store)
        .args(args)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    String::from_utf8(output).expect("utf8 stderr")
}

fn seed(store: &Path) {
    run_ok(store, &["add-vertex", "alice"]);
    run_ok(store, &["add-vertex", "bob"]);
    run_ok(store, &["add-edge", "--id", "e1", "alice", "bob", "knows"]);
    run_ok(store, &["set-prop", "alice", "age", "34", "--type", "int"]);
    run_ok(store, &["set-prop", "--kind", "edge", "e1", "since", "2019", "--type", "int"]);
}

#[test]
fn writes_persist_across_invocations() {
    let (_dir, store) = store_path();
    assert_eq!(run_ok(&store, &["add-vertex", "alice"]).trim(), "added vertex alice");
    assert!(store.exists());
    assert!(fs::metadata(&store).expect("snapshot").len() > 0);

    let out = run_ok(&store, &["show-vertex", "alice"]);
    assert_eq!(out.lines().next(), Some("vertex alice"));
}

#[test]
fn show_vertex_reports_properties_and_adjacency() {
    let (_dir, store) = store_path();
    seed(&store);

    let alice = run_json(&store, &["show-vertex", "alice"]);
    assert_eq!(alice["id"], "alice");
    assert_eq!(alice["properties"]["age"]["Int"], 34);
    assert_eq!(alice["out_edges"], serde_json::json!(["e1"]));
    assert_eq!(alice["in_edges"], serde_json::json!([]));

    let text = run_ok(&store, &["show-vertex", "bob"]);
    assert!(text.contains("  <- e1"), "{text}");
}

#[test]
fn show_edge_reports_endpoints() {
    let (_dir, store) = store_path();
    seed(&store);

    let edge = run_json(&store, &["show-edge", "e1"]);
    assert_eq!(edge["label"], "knows");
    assert_eq!(edge["out_vertex"], "alice");
    assert_eq!(edge["in_vertex"], "bob");
    assert_eq!(edge["properties"]["since"]["Int"], 2019);

    let text = run_ok(&store, &["show-edge", "e1"]);
    assert_eq!(text.lines().next(), Some("edge e1 alice -[knows]-> bob"));
}

#[test]
fn find_uses_key_indexes_and_scans() {
    let (_dir, store) = store_path();
    seed(&store);

    assert_eq!(run_ok(&store, &["find", "age", "34", "--type", "int"]).trim(), "alice");
    assert!(run_ok(&store, &["find", "age", "34"]).trim().is_empty());

    run_ok(&store, &["key-index", "create", "age"]);
    let keys = run_json(&store, &["key-index", "list"]);
    assert_eq!(keys, serde_json::json!(["age"]));
    let found = run_json(&store, &["find", "age", "34", "--type", "int"]);
    assert_eq!(found, serde_json::json!(["alice"]));

    let by_label = run_json(&store, &["find", "--kind", "edge", "label", "knows"]);
    assert_eq!(by_label, serde_json::json!(["e1"]));
}

#[test]
fn named_indexes_can_be_created_listed_and_dropped() {
    let (_dir, store) = store_path();
    run_ok(&store, &["index", "create", "people"]);
    run_ok(&store, &["index", "create", "links", "--kind", "edge"]);

    let listed = run_json(&store, &["index", "list"]);
    let names: Vec<&str> = listed
        .as_array()
        .expect("array")
        .iter()
        .map(|entry| entry["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"people") && names.contains(&"links"));

    run_ok(&store, &["index", "drop", "people"]);
    assert_eq!(run_ok(&store, &["index", "list"]).trim(), "links (edge)");

    let err = run_err(&store, &["index", "drop", "people"]);
    assert!(err.contains("people"), "{err}");
}

#[test]
fn removing_a_vertex_removes_its_edges() {
    let (_dir, store) = store_path();
    seed(&store);

    run_ok(&store, &["remove-vertex", "bob"]);
    let dump = run_json(&store, &["dump"]);
    assert_eq!(dump["vertices"].as_array().expect("vertices").len(), 1);
    assert!(dump["edges"].as_array().expect("edges").is_empty());
    assert_eq!(dump["vertices"][0]["out_edges"], serde_json::json!([]));
}

#[test]
fn failures_exit_non_zero_with_a_message() {
    let (_dir, store) = store_path();
    run_ok(&store, &["add-vertex", "alice"]);

    let dup = run_err(&store, &["add-vertex", "alice"]);
    assert!(dup.starts_with("error:"), "{dup}");
    assert!(dup.contains("alice"), "{dup}");

    let missing = run_err(&store, &["show-vertex", "nobody"]);
    assert!(missing.contains("vertex nobody does not exist"), "{missing}");

    let bad_value = run_err(&store, &["set-prop", "alice", "age", "old", "--type", "int"]);
    assert!(bad_value.starts_with("error:"), "{bad_value}");
}

#[test]
fn config_file_selects_the_graph() {
    let (dir, store) = store_path();
    let config = dir.path().join("graph.toml");
    fs::write(&config, "graph_name = \"social\"\ncheck_edge_endpoints = true\n").expect("config");
    let config = config.to_str().expect("utf8 path");

    run_ok(&store, &["--config", config, "add-vertex", "a"]);
    let err = run_err(&store, &["--config", config, "add-edge", "a", "ghost", "knows"]);
    assert!(err.contains("ghost"), "{err}");

    assert!(run_err(&store, &["show-vertex", "a"]).contains("does not exist"));
    assert_eq!(
        run_ok(&store, &["--graph", "social", "show-vertex", "a"]).trim(),
        "vertex a"
    );
}
