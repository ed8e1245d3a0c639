//! Scenario: late events and delete semantics across runs.
//!
//! - an event older than the row's last applied event never regresses it,
//!   even when it arrives in a later run
//! - soft and hard deletes both keep the row, flagged deleted
//! - a later update on a deleted row keeps it deleted unless told otherwise

use cdc_reconcile::ReconcileEngine;
use cdc_schemas::{DeleteMode, Entity};
use cdc_store::{load_state, MemoryStore};
use cdc_testkit::{delete, product_insert, ts, update, user_insert};
use serde_json::json;

#[test]
fn late_event_in_later_run_does_not_regress() {
    let mut engine = ReconcileEngine::new(MemoryStore::new());
    engine
        .merge(&[
            user_insert("e1", "U1", ts("2026-08-01T08:00:00Z")),
            update(
                "e2",
                Entity::Users,
                "U1",
                ts("2026-08-01T12:00:00Z"),
                json!({"email": "new@example.com"}),
            ),
        ])
        .unwrap();

    let report = engine
        .merge(&[update(
            "e3",
            Entity::Users,
            "U1",
            ts("2026-08-01T10:00:00Z"),
            json!({"email": "stale@example.com"}),
        )])
        .unwrap();
    assert_eq!(report.processed_count, 1);
    assert_eq!(report.late_count, 1);
    assert_eq!(report.applied_count, 0);

    let state = load_state(engine.store()).unwrap();
    let row = &state.users["U1"];
    assert_eq!(row.record.email.as_deref(), Some("new@example.com"));
    assert_eq!(row.last_event_id.as_deref(), Some("e2"));
    assert_eq!(row.last_event_ts, Some(ts("2026-08-01T12:00:00Z")));

    // The late id is still recorded; replaying it is a duplicate.
    let replay = engine
        .merge(&[update(
            "e3",
            Entity::Users,
            "U1",
            ts("2026-08-01T10:00:00Z"),
            json!({"email": "stale@example.com"}),
        )])
        .unwrap();
    assert_eq!(replay.already_applied, 1);
    assert_eq!(replay.late_count, 0);
}

#[test]
fn deletes_keep_rows_and_flag_them() {
    let mut engine = ReconcileEngine::new(MemoryStore::new());
    engine
        .merge(&[
            product_insert("p1", "P1", ts("2026-08-02T08:00:00Z")),
            product_insert("p2", "P2", ts("2026-08-02T08:00:00Z")),
        ])
        .unwrap();
    engine
        .merge(&[
            delete("d1", Entity::Products, "P1", ts("2026-08-02T09:00:00Z"), None),
            delete(
                "d2",
                Entity::Products,
                "P2",
                ts("2026-08-02T09:00:00Z"),
                Some("hard"),
            ),
        ])
        .unwrap();

    let state = load_state(engine.store()).unwrap();
    assert_eq!(state.products.len(), 2);

    let soft = &state.products["P1"];
    assert!(soft.is_deleted);
    assert_eq!(soft.delete_mode, Some(DeleteMode::Soft));
    assert_eq!(soft.record.name.as_deref(), Some("Product P1"));
    assert_eq!(soft.record.updated_at, Some(ts("2026-08-02T09:00:00Z")));

    let hard = &state.products["P2"];
    assert!(hard.is_deleted);
    assert_eq!(hard.delete_mode, Some(DeleteMode::Hard));
    assert_eq!(hard.record.price, Some(12.5));

    engine
        .merge(&[update(
            "u1",
            Entity::Products,
            "P1",
            ts("2026-08-02T10:00:00Z"),
            json!({"price": 9.0}),
        )])
        .unwrap();
    let state = load_state(engine.store()).unwrap();
    let row = &state.products["P1"];
    assert!(row.is_deleted);
    assert_eq!(row.record.price, Some(9.0));

    engine
        .merge(&[update(
            "u2",
            Entity::Products,
            "P1",
            ts("2026-08-02T11:00:00Z"),
            json!({"is_deleted": false}),
        )])
        .unwrap();
    let state = load_state(engine.store()).unwrap();
    let row = &state.products["P1"];
    assert!(!row.is_deleted);
    assert_eq!(row.delete_mode, None);
}
