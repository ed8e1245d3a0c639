use std::collections::{BTreeMap, BTreeSet};

use cdc_schemas::{
    validate_change, Change, CurrentState, Entity, EntityRecord, Event, Operation,
    OrderItemRecord, OrderRecord, PaymentRecord, ProductRecord, SchemaError, StateRow, Table,
    UserRecord,
};
use cdc_store::{load_state, StateStore};
use tracing::{debug, info};

use crate::{EntityMergeStats, MergeError, MergeReport};

/// Sort by `(event_ts, event_id)` and drop repeated `event_id`s, keeping the
/// first occurrence in sorted order.
pub fn order_and_dedupe(events: &[Event]) -> Vec<&Event> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));

    let mut seen = BTreeSet::new();
    sorted.retain(|ev| seen.insert(ev.event_id.as_str()));
    sorted
}

/// Apply one entity's events to its table, in the order given.
///
/// Callers pass events already in `(event_ts, event_id)` order. An event
/// strictly older than the row's `_last_event_ts` is skipped before its
/// payload is looked at. The first invalid payload aborts the pass; the table
/// may then hold partial changes and must be discarded.
pub fn apply_entity_events<R: EntityRecord>(
    table: &mut Table<R>,
    events: &[&Event],
) -> Result<EntityMergeStats, MergeError> {
    let mut stats = EntityMergeStats {
        considered: events.len(),
        ..EntityMergeStats::default()
    };

    for &event in events {
        debug_assert_eq!(event.entity, R::ENTITY);
        let pk = event.primary_key.as_str();

        if let Some(existing) = table.get(pk) {
            if existing.is_newer_than(event.event_ts) {
                debug!(
                    entity = %R::ENTITY,
                    pk,
                    event_id = %event.event_id,
                    event_ts = %event.event_ts,
                    last_event_ts = ?existing.last_event_ts,
                    "late event skipped"
                );
                stats.late_skipped += 1;
                continue;
            }
        }

        let change = validate_change::<R>(event.operation, &event.payload).map_err(|source| {
            MergeError::Validation {
                event_id: event.event_id.clone(),
                source,
            }
        })?;

        let mut row = match change {
            Change::Insert(insert) => {
                if R::insert_key(&insert) != pk {
                    return Err(MergeError::Validation {
                        event_id: event.event_id.clone(),
                        source: SchemaError::new(
                            R::ENTITY,
                            Operation::Insert,
                            R::ENTITY.primary_key_field(),
                            format!(
                                "payload key {:?} does not match event key {pk:?}",
                                R::insert_key(&insert)
                            ),
                        )
                        .into(),
                    });
                }
                let is_deleted = R::insert_is_deleted(&insert);
                StateRow::fresh(R::from_insert(insert), is_deleted)
            }
            Change::Update(update) => {
                let mut row = table.remove(pk).unwrap_or_else(|| StateRow::keyed(pk));
                if let Some(is_deleted) = row.record.apply_update(update) {
                    row.is_deleted = is_deleted;
                }
                if !row.is_deleted {
                    row.delete_mode = None;
                }
                row
            }
            Change::Delete(delete) => {
                let mut row = table.remove(pk).unwrap_or_else(|| StateRow::keyed(pk));
                row.record.set_updated_at(delete.updated_at);
                row.is_deleted = true;
                row.delete_mode = Some(delete.delete_mode);
                row
            }
        };

        row.stamp(event);
        table.insert(pk.to_string(), row);
        stats.applied += 1;
    }

    Ok(stats)
}

fn apply_entity(
    state: &mut CurrentState,
    entity: Entity,
    events: &[&Event],
) -> Result<EntityMergeStats, MergeError> {
    match entity {
        Entity::Users => apply_entity_events(UserRecord::table_mut(state), events),
        Entity::Products => apply_entity_events(ProductRecord::table_mut(state), events),
        Entity::Orders => apply_entity_events(OrderRecord::table_mut(state), events),
        Entity::OrderItems => apply_entity_events(OrderItemRecord::table_mut(state), events),
        Entity::Payments => apply_entity_events(PaymentRecord::table_mut(state), events),
    }
}

fn save_entity<S: StateStore>(
    store: &mut S,
    state: &CurrentState,
    entity: Entity,
) -> anyhow::Result<()> {
    match entity {
        Entity::Users => store.save_table(&state.users),
        Entity::Products => store.save_table(&state.products),
        Entity::Orders => store.save_table(&state.orders),
        Entity::OrderItems => store.save_table(&state.order_items),
        Entity::Payments => store.save_table(&state.payments),
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the state store for the duration of a run.
#[derive(Debug)]
pub struct ReconcileEngine<S> {
    store: S,
}

impl<S: StateStore> ReconcileEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Reconcile one batch into current state.
    ///
    /// Every fresh event id (late ones included) is added to the ledger, so a
    /// replayed batch is a no-op with byte-identical state. Touched tables and
    /// the ledger are written only after every entity pass succeeded.
    pub fn merge(&mut self, events: &[Event]) -> Result<MergeReport, MergeError> {
        let batch = order_and_dedupe(events);
        let duplicate_in_batch = events.len() - batch.len();

        let mut ledger = self.store.load_ledger()?;
        let unique = batch.len();
        let fresh: Vec<&Event> = batch
            .into_iter()
            .filter(|ev| !ledger.contains(&ev.event_id))
            .collect();
        let already_applied = unique - fresh.len();

        let mut state = load_state(&self.store)?;

        let mut per_entity = BTreeMap::new();
        for entity in Entity::ALL {
            let subset: Vec<&Event> = fresh
                .iter()
                .copied()
                .filter(|ev| ev.entity == entity)
                .collect();
            if subset.is_empty() {
                continue;
            }
            let stats = apply_entity(&mut state, entity, &subset)?;
            debug!(
                entity = %entity,
                considered = stats.considered,
                applied = stats.applied,
                late = stats.late_skipped,
                "entity pass complete"
            );
            per_entity.insert(entity, stats);
        }

        if !fresh.is_empty() {
            for &entity in per_entity.keys() {
                save_entity(&mut self.store, &state, entity)?;
            }
            ledger.extend(fresh.iter().map(|ev| ev.event_id.as_str()));
            self.store.save_ledger(&ledger)?;
        }

        let report = MergeReport {
            processed_count: fresh.len(),
            applied_count: per_entity.values().map(|s| s.applied).sum(),
            late_count: per_entity.values().map(|s| s.late_skipped).sum(),
            duplicate_in_batch,
            already_applied,
            per_entity,
            row_counts: state.row_counts(),
        };

        info!(
            received = events.len(),
            processed = report.processed_count,
            applied = report.applied_count,
            late = report.late_count,
            duplicate_in_batch = report.duplicate_in_batch,
            already_applied = report.already_applied,
            ledger_size = ledger.len(),
            "merge complete"
        );

        Ok(report)
    }
}
