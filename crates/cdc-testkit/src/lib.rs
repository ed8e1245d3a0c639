//! Event builders and synthetic batches for tests.
//!
//! Builders produce wire-shaped [`Event`]s with JSON payloads exactly as an
//! upstream producer would send them, so tests exercise validation too.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{json, Value};

use cdc_schemas::{Entity, Event, Operation};

/// Parse an RFC 3339 timestamp. Panics on bad input; fixtures only.
pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("fixture timestamp must be RFC 3339")
        .with_timezone(&Utc)
}

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("fixture date must be YYYY-MM-DD")
}

pub fn event(
    event_id: &str,
    entity: Entity,
    operation: Operation,
    at: DateTime<Utc>,
    pk: &str,
    payload: Value,
) -> Event {
    Event {
        event_id: event_id.to_string(),
        entity,
        operation,
        event_ts: at,
        primary_key: pk.to_string(),
        payload,
        schema_version: 1,
    }
}

// ---------------------------------------------------------------------------
// Inserts
// ---------------------------------------------------------------------------

pub fn user_insert(event_id: &str, user_id: &str, at: DateTime<Utc>) -> Event {
    event(
        event_id,
        Entity::Users,
        Operation::Insert,
        at,
        user_id,
        json!({
            "user_id": user_id,
            "name": format!("User {user_id}"),
            "email": format!("{}@example.com", user_id.to_lowercase()),
            "region": "EU",
            "created_at": at,
            "updated_at": at,
        }),
    )
}

pub fn product_insert(event_id: &str, product_id: &str, at: DateTime<Utc>) -> Event {
    event(
        event_id,
        Entity::Products,
        Operation::Insert,
        at,
        product_id,
        json!({
            "product_id": product_id,
            "name": format!("Product {product_id}"),
            "category": "books",
            "price": 12.5,
            "currency": "EUR",
            "created_at": at,
            "updated_at": at,
        }),
    )
}

pub fn order_insert(event_id: &str, order_id: &str, user_id: &str, at: DateTime<Utc>) -> Event {
    event(
        event_id,
        Entity::Orders,
        Operation::Insert,
        at,
        order_id,
        json!({
            "order_id": order_id,
            "user_id": user_id,
            "status": "created",
            "order_ts": at,
            "updated_at": at,
        }),
    )
}

pub fn order_item_insert(
    event_id: &str,
    order_item_id: &str,
    order_id: &str,
    product_id: &str,
    qty: i64,
    at: DateTime<Utc>,
) -> Event {
    event(
        event_id,
        Entity::OrderItems,
        Operation::Insert,
        at,
        order_item_id,
        json!({
            "order_item_id": order_item_id,
            "order_id": order_id,
            "product_id": product_id,
            "qty": qty,
            "unit_price": 12.5,
            "created_at": at,
        }),
    )
}

pub fn payment_insert(
    event_id: &str,
    payment_id: &str,
    order_id: &str,
    amount: f64,
    at: DateTime<Utc>,
) -> Event {
    event(
        event_id,
        Entity::Payments,
        Operation::Insert,
        at,
        payment_id,
        json!({
            "payment_id": payment_id,
            "order_id": order_id,
            "method": "card",
            "amount": amount,
            "status": "authorized",
            "created_at": at,
            "updated_at": at,
        }),
    )
}

// ---------------------------------------------------------------------------
// Updates / deletes
// ---------------------------------------------------------------------------

/// Update with `fields` merged over the mandatory `updated_at`.
pub fn update(
    event_id: &str,
    entity: Entity,
    pk: &str,
    at: DateTime<Utc>,
    fields: Value,
) -> Event {
    let mut payload = json!({ "updated_at": at });
    if let (Some(obj), Value::Object(extra)) = (payload.as_object_mut(), fields) {
        obj.extend(extra);
    }
    event(event_id, entity, Operation::Update, at, pk, payload)
}

pub fn delete(
    event_id: &str,
    entity: Entity,
    pk: &str,
    at: DateTime<Utc>,
    delete_mode: Option<&str>,
) -> Event {
    let mut payload = json!({ "updated_at": at });
    if let (Some(obj), Some(mode)) = (payload.as_object_mut(), delete_mode) {
        obj.insert("delete_mode".into(), json!(mode));
    }
    event(event_id, entity, Operation::Delete, at, pk, payload)
}

// ---------------------------------------------------------------------------
// Synthetic batches
// ---------------------------------------------------------------------------

/// A referentially complete batch for one business day: per order, a new
/// user, product, order and line item (four events). Ids embed the date, so
/// consecutive days never collide.
pub fn day_batch(date: NaiveDate, orders: usize) -> Vec<Event> {
    let start = date
        .and_hms_opt(8, 0, 0)
        .expect("08:00 exists on every date")
        .and_utc();
    let tag = date.format("%Y%m%d");

    let mut out = Vec::with_capacity(orders * 4);
    for i in 0..orders {
        let at = start + Duration::minutes(i as i64);
        let user = format!("U-{tag}-{i}");
        let product = format!("P-{tag}-{i}");
        let order = format!("O-{tag}-{i}");
        let item = format!("OI-{tag}-{i}");
        out.push(user_insert(&format!("evt-{tag}-{i}-u"), &user, at));
        out.push(product_insert(&format!("evt-{tag}-{i}-p"), &product, at));
        out.push(order_insert(
            &format!("evt-{tag}-{i}-o"),
            &order,
            &user,
            at + Duration::seconds(1),
        ));
        out.push(order_item_insert(
            &format!("evt-{tag}-{i}-oi"),
            &item,
            &order,
            &product,
            1 + (i as i64 % 3),
            at + Duration::seconds(2),
        ));
    }
    out
}
