//! cdc-reconcile
//!
//! Current-state reconciliation of a CDC event batch.
//!
//! Guarantees:
//! - exactly-once effect under at-least-once delivery (dedup ledger)
//! - late events (older than the row's `_last_event_ts`) never overwrite newer state
//! - every applied payload satisfies its entity contract
//!
//! Single writer per state store. Tables are loaded whole, mutated in
//! memory, and replaced whole; nothing is persisted when any entity pass fails.

mod engine;
mod types;

pub use engine::{apply_entity_events, order_and_dedupe, ReconcileEngine};
pub use types::*;
