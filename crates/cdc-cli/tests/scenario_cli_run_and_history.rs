//! Scenario: `cdc run` lands a batch, runs the pipeline, and appends history.
//!
//! - `--land` writes the batch into the bronze partition for the date
//! - a later `run` without `--events` reads that partition back
//! - `history` prints the recorded runs oldest first
//! - a run that merges but fails the gate exits 3

use assert_cmd::Command;
use cdc_store::events::write_events_jsonl;
use cdc_testkit::{day, day_batch};
use predicates::prelude::*;

fn cdc(root: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("cdc").unwrap();
    cmd.env("RUST_LOG", "warn")
        .arg("--project-root")
        .arg(root);
    cmd
}

fn history(root: &std::path::Path) -> Vec<serde_json::Value> {
    let out = cdc(root)
        .arg("history")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&out).unwrap()
}

#[test]
fn run_lands_batch_and_records_history() {
    let root = tempfile::tempdir().unwrap();
    let batch = root.path().join("incoming.jsonl");
    write_events_jsonl(&batch, &day_batch(day("2026-06-01"), 3)).unwrap();

    cdc(root.path())
        .args(["run", "--date", "2026-06-01", "--land", "--events"])
        .arg(&batch)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"processed_events_count\": 12"));

    assert!(root
        .path()
        .join("data/bronze/event_date=2026-06-01")
        .is_dir());

    // Same date from bronze: everything already applied.
    cdc(root.path())
        .args(["run", "--date", "2026-06-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"processed_events_count\": 0"));

    let records = history(root.path());
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["run_date"], "2026-06-01");
    assert_eq!(records[0]["processed_events_count"], 12);
}

#[test]
fn gate_failure_after_merge_exits_three() {
    let root = tempfile::tempdir().unwrap();
    for (i, d) in ["2026-06-01", "2026-06-02", "2026-06-03"].iter().enumerate() {
        let batch = root.path().join(format!("b{i}.jsonl"));
        write_events_jsonl(&batch, &day_batch(day(d), 25)).unwrap();
        cdc(root.path())
            .args(["run", "--date", d, "--events"])
            .arg(&batch)
            .assert()
            .success();
    }

    let spike = root.path().join("spike.jsonl");
    write_events_jsonl(&spike, &day_batch(day("2026-06-04"), 250)).unwrap();
    cdc(root.path())
        .args(["run", "--date", "2026-06-04", "--events"])
        .arg(&spike)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("error[AnomalyError]"));

    assert_eq!(history(root.path()).len(), 3);
}

#[test]
fn backfill_rejects_reversed_range() {
    let root = tempfile::tempdir().unwrap();
    cdc(root.path())
        .args(["backfill", "--start", "2026-06-03", "--end", "2026-06-01"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error[InvalidRange]"));
}
