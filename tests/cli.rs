use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn lpa() -> Command {
    Command::cargo_bin("lpa_community").expect("binary should be built")
}

fn edge_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    for line in lines {
        writeln!(file, "{}", line).expect("failed to write edge");
    }
    file
}

#[test]
fn test_sample_graph_json() {
    let output = lpa().arg("data/lpg.txt").output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["converged"], true);
    assert_eq!(value["labels"].as_object().unwrap().len(), 9);
    assert_eq!(value["communities"].as_array().unwrap().len(), 3);
    assert_eq!(value["labels"]["1"], value["labels"]["2"]);
    assert_ne!(value["labels"]["1"], value["labels"]["9"]);
}

#[test]
fn test_tsv_output_file() {
    let edges = edge_file(&["a\tb\t5", "b\tc", "x\ty"]);
    let out = NamedTempFile::new().unwrap();
    lpa()
        .arg(edges.path())
        .args(["--format", "tsv", "--output"])
        .arg(out.path())
        .assert()
        .success();
    let text = std::fs::read_to_string(out.path()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0].split('\t').next(), Some("a"));
    assert_eq!(lines[3].split('\t').next(), Some("x"));
}

#[test]
fn test_malformed_line_is_reported() {
    let edges = edge_file(&["a\tb", "b\tc\theavy"]);
    lpa()
        .arg(edges.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("heavy"));
}

#[test]
fn test_missing_input() {
    lpa()
        .arg("data/does-not-exist.txt")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load graph"));
}

#[test]
fn test_config_file_and_overrides() {
    let mut config = NamedTempFile::new().unwrap();
    writeln!(config, "propagation:\n  max_iterations: 0\n  update_mode: synchronous").unwrap();
    let edges = edge_file(&["p\tq"]);
    // A single edge never settles under synchronous updates.
    lpa()
        .arg(edges.path())
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"converged\": false"))
        .stdout(predicate::str::contains("\"iterations\": 1"));

    lpa()
        .arg(edges.path())
        .arg("--config")
        .arg(config.path())
        .args(["--tie-break", "seeded", "--seed", "9", "-n", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"iterations\": 4"));
}
