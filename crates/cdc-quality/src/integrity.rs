use std::collections::BTreeSet;

use cdc_schemas::{CurrentState, Entity, Table};

use crate::{IntegrityViolation, QualityConfig};

const SAMPLE_KEYS: usize = 5;

/// Core-table, foreign-key, and value checks over reconciled state.
///
/// Soft-deleted rows take part like any other row: a deleted order still
/// satisfies a line item's reference.
pub fn check_integrity(
    state: &CurrentState,
    cfg: &QualityConfig,
) -> Result<(), IntegrityViolation> {
    for &entity in &cfg.core_entities {
        if state.row_count(entity) == 0 {
            return Err(IntegrityViolation::EmptyCoreTable { entity });
        }
    }

    references(
        &state.orders,
        Entity::Orders,
        "user_id",
        |r| r.user_id.as_deref(),
        &state.users,
        Entity::Users,
    )?;
    references(
        &state.order_items,
        Entity::OrderItems,
        "order_id",
        |r| r.order_id.as_deref(),
        &state.orders,
        Entity::Orders,
    )?;
    references(
        &state.order_items,
        Entity::OrderItems,
        "product_id",
        |r| r.product_id.as_deref(),
        &state.products,
        Entity::Products,
    )?;

    // A line item with no quantity counts as zero.
    value_rule(
        &state.order_items,
        Entity::OrderItems,
        "qty",
        "positive",
        |r| r.qty.unwrap_or(0) <= 0,
    )?;
    value_rule(
        &state.order_items,
        Entity::OrderItems,
        "unit_price",
        "non-negative",
        |r| r.unit_price.is_some_and(|p| p < 0.0),
    )?;
    value_rule(
        &state.payments,
        Entity::Payments,
        "amount",
        "non-negative",
        |r| r.amount.is_some_and(|a| a < 0.0),
    )?;

    Ok(())
}

fn references<R, T>(
    rows: &Table<R>,
    entity: Entity,
    field: &'static str,
    key: impl Fn(&R) -> Option<&str>,
    targets: &Table<T>,
    target: Entity,
) -> Result<(), IntegrityViolation> {
    let missing: BTreeSet<&str> = rows
        .values()
        .filter_map(|row| key(&row.record))
        .filter(|k| !targets.contains_key(*k))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    Err(IntegrityViolation::MissingReferences {
        entity,
        field,
        target,
        missing: missing.len(),
        sample: missing
            .iter()
            .take(SAMPLE_KEYS)
            .map(|k| k.to_string())
            .collect(),
    })
}

fn value_rule<R>(
    rows: &Table<R>,
    entity: Entity,
    field: &'static str,
    rule: &'static str,
    violates: impl Fn(&R) -> bool,
) -> Result<(), IntegrityViolation> {
    let mut offending = rows.iter().filter(|(_, row)| violates(&row.record));
    let Some((first_pk, _)) = offending.next() else {
        return Ok(());
    };
    Err(IntegrityViolation::InvalidValue {
        entity,
        field,
        rule,
        rows: 1 + offending.count(),
        first_pk: first_pk.clone(),
    })
}
