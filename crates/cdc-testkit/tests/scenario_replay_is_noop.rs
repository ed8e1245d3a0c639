//! Scenario: merge idempotence and order independence, file-backed.
//!
//! - replaying an applied batch leaves every state file byte-identical
//! - a shuffled copy of a batch converges to the same tables as the sorted one
//! - the same key's events split across runs in a different arrival order
//!   converge to the same bytes, with the stale update skipped as late
//! - the ledger lists every applied event id

use std::fs;
use std::path::Path;

use cdc_reconcile::ReconcileEngine;
use cdc_schemas::{DedupLedger, Entity};
use cdc_store::{FileStore, StateStore};
use cdc_testkit::{day, day_batch, ts, update, user_insert};
use serde_json::json;

fn snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<(String, Vec<u8>)> = fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            let path = e.unwrap().path();
            (
                path.file_name().unwrap().to_string_lossy().into_owned(),
                fs::read(&path).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}

#[test]
fn replaying_a_batch_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let mut batch = day_batch(day("2026-07-01"), 4);
    batch.push(update(
        "evt-upd-1",
        Entity::Orders,
        "O-20260701-0",
        ts("2026-07-01T09:00:00Z"),
        json!({"status": "paid"}),
    ));

    let mut engine = ReconcileEngine::new(FileStore::open(dir.path()).unwrap());
    let first = engine.merge(&batch).unwrap();
    assert_eq!(first.processed_count, 17);
    assert_eq!(first.applied_count, 17);
    let before = snapshot(dir.path());

    let second = engine.merge(&batch).unwrap();
    assert_eq!(second.processed_count, 0);
    assert_eq!(second.already_applied, 17);
    assert_eq!(snapshot(dir.path()), before);

    let ledger: DedupLedger = engine.store().load_ledger().unwrap();
    assert_eq!(ledger.len(), 17);
    assert!(ledger.contains("evt-upd-1"));
}

#[test]
fn shuffled_batch_converges_to_sorted_result() {
    let mut batch = day_batch(day("2026-07-02"), 3);
    batch.push(update(
        "evt-upd-a",
        Entity::Users,
        "U-20260702-1",
        ts("2026-07-02T10:00:00Z"),
        json!({"region": "US"}),
    ));
    batch.push(update(
        "evt-upd-b",
        Entity::Users,
        "U-20260702-1",
        ts("2026-07-02T11:00:00Z"),
        json!({"region": "APAC"}),
    ));

    let sorted_dir = tempfile::tempdir().unwrap();
    ReconcileEngine::new(FileStore::open(sorted_dir.path()).unwrap())
        .merge(&batch)
        .unwrap();

    let mut shuffled = batch.clone();
    shuffled.reverse();
    shuffled.swap(1, 4);
    let shuffled_dir = tempfile::tempdir().unwrap();
    let mut engine = ReconcileEngine::new(FileStore::open(shuffled_dir.path()).unwrap());
    engine.merge(&shuffled).unwrap();

    assert_eq!(snapshot(shuffled_dir.path()), snapshot(sorted_dir.path()));

    let state = cdc_store::load_state(engine.store()).unwrap();
    let user = &state.users["U-20260702-1"];
    assert_eq!(user.record.region.as_deref(), Some("APAC"));
    assert_eq!(user.last_event_id.as_deref(), Some("evt-upd-b"));
}

fn merge_runs(dir: &Path, runs: &[Vec<cdc_schemas::Event>]) -> Vec<RunCounts> {
    let mut engine = ReconcileEngine::new(FileStore::open(dir).unwrap());
    runs.iter()
        .map(|batch| {
            let r = engine.merge(batch).unwrap();
            RunCounts {
                processed: r.processed_count,
                applied: r.applied_count,
                late: r.late_count,
            }
        })
        .collect()
}

#[derive(Debug, PartialEq)]
struct RunCounts {
    processed: usize,
    applied: usize,
    late: usize,
}

#[test]
fn cross_run_arrival_order_converges() {
    let insert = user_insert("evt-i", "U7", ts("2026-07-03T08:00:00Z"));
    let upd_t2 = update(
        "evt-u2",
        Entity::Users,
        "U7",
        ts("2026-07-03T09:00:00Z"),
        json!({"email": "second@example.com", "region": "US"}),
    );
    let upd_t3 = update(
        "evt-u3",
        Entity::Users,
        "U7",
        ts("2026-07-03T10:00:00Z"),
        json!({"email": "third@example.com", "region": "APAC"}),
    );

    let in_order = tempfile::tempdir().unwrap();
    let counts = merge_runs(
        in_order.path(),
        &[
            vec![insert.clone()],
            vec![upd_t2.clone()],
            vec![upd_t3.clone()],
        ],
    );
    assert!(counts.iter().all(|c| c.late == 0));

    let reordered = tempfile::tempdir().unwrap();
    let counts = merge_runs(
        reordered.path(),
        &[vec![insert, upd_t3], vec![upd_t2]],
    );
    assert_eq!(
        counts[1],
        RunCounts {
            processed: 1,
            applied: 0,
            late: 1
        }
    );

    assert_eq!(snapshot(reordered.path()), snapshot(in_order.path()));

    let store = FileStore::open(reordered.path()).unwrap();
    let state = cdc_store::load_state(&store).unwrap();
    let row = &state.users["U7"];
    assert_eq!(row.record.email.as_deref(), Some("third@example.com"));
    assert_eq!(row.last_event_id.as_deref(), Some("evt-u3"));
}
