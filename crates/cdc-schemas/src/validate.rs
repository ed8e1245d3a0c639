//! Payload contract enforcement.
//!
//! Given `(entity, operation, raw payload)` the validator either returns a
//! typed change or names the offending field. Rules:
//! - inserts must carry every required field and nothing else (closed schema)
//! - updates require `updated_at`; every other declared field is optional
//! - deletes require `updated_at`; `is_deleted` defaults to `true`,
//!   `delete_mode` to `soft`
//! - numeric fields declare inclusive lower bounds
//! - insert-only entities reject updates and deletes
//!
//! Explicit `null` is treated as an absent field. Pure; no side effects.

use std::fmt;

use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::event::{Entity, Operation};
use crate::payload::{DeleteMode, DeletePayload};
use crate::row::{
    EntityRecord, OrderItemRecord, OrderRecord, PaymentRecord, ProductRecord, UserRecord,
};

// ---------------------------------------------------------------------------
// Field contract
// ---------------------------------------------------------------------------

/// Accepted JSON shape for a payload field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    /// RFC 3339 timestamp string.
    Timestamp,
    Bool,
    /// Any JSON number, with an optional inclusive lower bound.
    Float { min: Option<f64> },
    /// Integral JSON number, with an optional inclusive lower bound.
    Int { min: Option<i64> },
    /// String drawn from a closed set.
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Delete payload contract, shared by every mutable entity.
pub const DELETE_FIELDS: &[FieldRule] = &[
    FieldRule::required("updated_at", FieldKind::Timestamp),
    FieldRule::optional("is_deleted", FieldKind::Bool),
    FieldRule::optional("delete_mode", FieldKind::OneOf(DeleteMode::NAMES)),
];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A payload broke its entity/operation contract. Points at bad upstream data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub entity: Entity,
    pub operation: Operation,
    pub field: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(
        entity: Entity,
        operation: Operation,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            entity,
            operation,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid payload for entity={} operation={}: field '{}': {}",
            self.entity, self.operation, self.field, self.reason
        )
    }
}

impl std::error::Error for SchemaError {}

/// The operation is not valid for the entity at all (e.g. updating a line item).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedOperationError {
    pub entity: Entity,
    pub operation: Operation,
}

impl fmt::Display for UnsupportedOperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported operation: {} only supports insert, got {}",
            self.entity, self.operation
        )
    }
}

impl std::error::Error for UnsupportedOperationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Schema(SchemaError),
    UnsupportedOperation(UnsupportedOperationError),
}

impl ValidationError {
    pub fn entity(&self) -> Entity {
        match self {
            ValidationError::Schema(e) => e.entity,
            ValidationError::UnsupportedOperation(e) => e.entity,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Schema(e) => e.fmt(f),
            ValidationError::UnsupportedOperation(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ValidationError::Schema(e) => Some(e),
            ValidationError::UnsupportedOperation(e) => Some(e),
        }
    }
}

impl From<SchemaError> for ValidationError {
    fn from(e: SchemaError) -> Self {
        ValidationError::Schema(e)
    }
}

impl From<UnsupportedOperationError> for ValidationError {
    fn from(e: UnsupportedOperationError) -> Self {
        ValidationError::UnsupportedOperation(e)
    }
}

// ---------------------------------------------------------------------------
// Typed output
// ---------------------------------------------------------------------------

/// A validated change for entity `R`.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<R: EntityRecord> {
    Insert(R::Insert),
    Update(R::Update),
    Delete(DeletePayload),
}

/// A validated change for any entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Users(Change<UserRecord>),
    Products(Change<ProductRecord>),
    Orders(Change<OrderRecord>),
    OrderItems(Change<OrderItemRecord>),
    Payments(Change<PaymentRecord>),
}

impl Payload {
    pub fn entity(&self) -> Entity {
        match self {
            Payload::Users(_) => Entity::Users,
            Payload::Products(_) => Entity::Products,
            Payload::Orders(_) => Entity::Orders,
            Payload::OrderItems(_) => Entity::OrderItems,
            Payload::Payments(_) => Entity::Payments,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Validate a raw payload for any entity.
pub fn validate_payload(
    entity: Entity,
    operation: Operation,
    raw: &Value,
) -> Result<Payload, ValidationError> {
    Ok(match entity {
        Entity::Users => Payload::Users(validate_change(operation, raw)?),
        Entity::Products => Payload::Products(validate_change(operation, raw)?),
        Entity::Orders => Payload::Orders(validate_change(operation, raw)?),
        Entity::OrderItems => Payload::OrderItems(validate_change(operation, raw)?),
        Entity::Payments => Payload::Payments(validate_change(operation, raw)?),
    })
}

/// Validate a raw payload for a statically known entity.
pub fn validate_change<R: EntityRecord>(
    operation: Operation,
    raw: &Value,
) -> Result<Change<R>, ValidationError> {
    let entity = R::ENTITY;
    if operation != Operation::Insert && !R::MUTABLE {
        return Err(UnsupportedOperationError { entity, operation }.into());
    }

    let rules = match operation {
        Operation::Insert => R::INSERT_FIELDS,
        Operation::Update => R::UPDATE_FIELDS,
        Operation::Delete => DELETE_FIELDS,
    };

    let mut fields = payload_object(entity, operation, raw)?;
    check_fields(entity, operation, &fields, rules)?;
    fields.retain(|_, v| !v.is_null());
    let obj = Value::Object(fields);

    Ok(match operation {
        Operation::Insert => Change::Insert(decode(entity, operation, obj)?),
        Operation::Update => Change::Update(decode(entity, operation, obj)?),
        Operation::Delete => Change::Delete(decode(entity, operation, obj)?),
    })
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Payloads arrive either as a JSON object or as a string holding one.
fn payload_object(
    entity: Entity,
    operation: Operation,
    raw: &Value,
) -> Result<Map<String, Value>, SchemaError> {
    let parsed;
    let value = match raw {
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s).map_err(|e| {
                SchemaError::new(entity, operation, "payload", format!("not valid JSON: {e}"))
            })?;
            &parsed
        }
        other => other,
    };
    match value {
        Value::Object(map) => Ok(map.clone()),
        other => Err(SchemaError::new(
            entity,
            operation,
            "payload",
            format!("expected a JSON object, got {}", json_kind(other)),
        )),
    }
}

fn check_fields(
    entity: Entity,
    operation: Operation,
    fields: &Map<String, Value>,
    rules: &[FieldRule],
) -> Result<(), SchemaError> {
    for name in fields.keys() {
        if !rules.iter().any(|r| r.name == name) {
            return Err(SchemaError::new(
                entity,
                operation,
                name.as_str(),
                "unrecognized field",
            ));
        }
    }

    for rule in rules {
        match fields.get(rule.name) {
            None | Some(Value::Null) => {
                if rule.required {
                    return Err(SchemaError::new(
                        entity,
                        operation,
                        rule.name,
                        "missing required field",
                    ));
                }
            }
            Some(v) => {
                check_kind(rule.kind, v)
                    .map_err(|reason| SchemaError::new(entity, operation, rule.name, reason))?;
            }
        }
    }
    Ok(())
}

fn check_kind(kind: FieldKind, v: &Value) -> Result<(), String> {
    match kind {
        FieldKind::Text => {
            if !v.is_string() {
                return Err(format!("expected string, got {}", json_kind(v)));
            }
        }
        FieldKind::Timestamp => {
            let s = v
                .as_str()
                .ok_or_else(|| format!("expected timestamp string, got {}", json_kind(v)))?;
            DateTime::parse_from_rfc3339(s)
                .map_err(|e| format!("invalid RFC 3339 timestamp '{s}': {e}"))?;
        }
        FieldKind::Bool => {
            if !v.is_boolean() {
                return Err(format!("expected boolean, got {}", json_kind(v)));
            }
        }
        FieldKind::Float { min } => {
            let x = v
                .as_f64()
                .ok_or_else(|| format!("expected number, got {}", json_kind(v)))?;
            if let Some(min) = min {
                if x < min {
                    return Err(format!("must be >= {min}, got {x}"));
                }
            }
        }
        FieldKind::Int { min } => {
            let x = v
                .as_i64()
                .ok_or_else(|| format!("expected integer, got {v}"))?;
            if let Some(min) = min {
                if x < min {
                    return Err(format!("must be >= {min}, got {x}"));
                }
            }
        }
        FieldKind::OneOf(allowed) => {
            let s = v
                .as_str()
                .ok_or_else(|| format!("expected string, got {}", json_kind(v)))?;
            if !allowed.contains(&s) {
                return Err(format!("'{s}' is not one of {allowed:?}"));
            }
        }
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(
    entity: Entity,
    operation: Operation,
    obj: Value,
) -> Result<T, SchemaError> {
    serde_json::from_value(obj)
        .map_err(|e| SchemaError::new(entity, operation, "payload", e.to_string()))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::OrderStatus;
    use serde_json::json;

    fn user_insert() -> Value {
        json!({
            "user_id": "U000001",
            "name": "User One",
            "email": "user1@example.com",
            "region": "US",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        })
    }

    fn schema_field(r: Result<Payload, ValidationError>) -> String {
        match r {
            Err(ValidationError::Schema(e)) => e.field,
            other => panic!("expected SchemaError, got {other:?}"),
        }
    }

    #[test]
    fn user_insert_accepted_with_is_deleted_default() {
        let p = validate_payload(Entity::Users, Operation::Insert, &user_insert()).unwrap();
        match p {
            Payload::Users(Change::Insert(i)) => {
                assert_eq!(i.email, "user1@example.com");
                assert!(!i.is_deleted);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn insert_missing_required_field_names_it() {
        let mut raw = user_insert();
        raw.as_object_mut().unwrap().remove("email");
        let field = schema_field(validate_payload(Entity::Users, Operation::Insert, &raw));
        assert_eq!(field, "email");
    }

    #[test]
    fn insert_with_null_required_field_is_missing() {
        let mut raw = user_insert();
        raw["region"] = Value::Null;
        let field = schema_field(validate_payload(Entity::Users, Operation::Insert, &raw));
        assert_eq!(field, "region");
    }

    #[test]
    fn unrecognized_field_rejected() {
        let mut raw = user_insert();
        raw["nickname"] = json!("uno");
        let field = schema_field(validate_payload(Entity::Users, Operation::Insert, &raw));
        assert_eq!(field, "nickname");
    }

    #[test]
    fn update_requires_updated_at_only() {
        let raw = json!({"email": "x@example.com"});
        let field = schema_field(validate_payload(Entity::Users, Operation::Update, &raw));
        assert_eq!(field, "updated_at");

        let raw = json!({"updated_at": "2026-01-01T01:00:00Z"});
        assert!(validate_payload(Entity::Users, Operation::Update, &raw).is_ok());
    }

    #[test]
    fn update_null_fields_are_absent() {
        let raw = json!({"updated_at": "2026-01-01T01:00:00Z", "name": null, "is_deleted": null});
        let p = validate_change::<UserRecord>(Operation::Update, &raw).unwrap();
        match p {
            Change::Update(u) => {
                assert_eq!(u.name, None);
                assert_eq!(u.is_deleted, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn update_rejects_insert_only_fields() {
        let raw = json!({"updated_at": "2026-01-01T01:00:00Z", "created_at": "2026-01-01T01:00:00Z"});
        let field = schema_field(validate_payload(Entity::Users, Operation::Update, &raw));
        assert_eq!(field, "created_at");
    }

    #[test]
    fn delete_defaults() {
        let raw = json!({"updated_at": "2026-01-02T02:00:00Z"});
        let p = validate_change::<ProductRecord>(Operation::Delete, &raw).unwrap();
        match p {
            Change::Delete(d) => {
                assert!(d.is_deleted);
                assert_eq!(d.delete_mode, DeleteMode::Soft);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn delete_mode_outside_set_rejected() {
        let raw = json!({"updated_at": "2026-01-02T02:00:00Z", "delete_mode": "purge"});
        let field = schema_field(validate_payload(Entity::Orders, Operation::Delete, &raw));
        assert_eq!(field, "delete_mode");
    }

    #[test]
    fn order_items_insert_only() {
        let raw = json!({"updated_at": "2026-01-02T02:00:00Z"});
        for op in [Operation::Update, Operation::Delete] {
            let err = validate_payload(Entity::OrderItems, op, &raw).unwrap_err();
            assert_eq!(
                err,
                ValidationError::UnsupportedOperation(UnsupportedOperationError {
                    entity: Entity::OrderItems,
                    operation: op,
                })
            );
        }
    }

    #[test]
    fn numeric_lower_bounds_are_inclusive() {
        let item = |qty: Value, unit_price: Value| {
            json!({
                "order_item_id": "OI1",
                "order_id": "O1",
                "product_id": "P1",
                "qty": qty,
                "unit_price": unit_price,
                "created_at": "2026-01-01T00:00:00Z",
            })
        };
        assert!(validate_payload(Entity::OrderItems, Operation::Insert, &item(json!(1), json!(0))).is_ok());

        let field = schema_field(validate_payload(
            Entity::OrderItems,
            Operation::Insert,
            &item(json!(0), json!(1.5)),
        ));
        assert_eq!(field, "qty");

        let field = schema_field(validate_payload(
            Entity::OrderItems,
            Operation::Insert,
            &item(json!(2), json!(-0.01)),
        ));
        assert_eq!(field, "unit_price");

        let field = schema_field(validate_payload(
            Entity::OrderItems,
            Operation::Insert,
            &item(json!(1.5), json!(1)),
        ));
        assert_eq!(field, "qty");
    }

    #[test]
    fn payment_update_amount_bounded() {
        let raw = json!({"updated_at": "2026-01-01T00:00:00Z", "amount": -1});
        let field = schema_field(validate_payload(Entity::Payments, Operation::Update, &raw));
        assert_eq!(field, "amount");
    }

    #[test]
    fn string_encoded_payload_accepted() {
        let raw = Value::String(user_insert().to_string());
        assert!(validate_payload(Entity::Users, Operation::Insert, &raw).is_ok());

        let field = schema_field(validate_payload(
            Entity::Users,
            Operation::Insert,
            &Value::String("{not json".into()),
        ));
        assert_eq!(field, "payload");

        let field = schema_field(validate_payload(Entity::Users, Operation::Insert, &json!([1, 2])));
        assert_eq!(field, "payload");
    }

    #[test]
    fn bad_timestamp_and_status_named() {
        let raw = json!({
            "order_id": "O1",
            "user_id": "U1",
            "status": "lost",
            "order_ts": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        });
        assert_eq!(schema_field(validate_payload(Entity::Orders, Operation::Insert, &raw)), "status");

        let mut raw = raw;
        raw["status"] = json!("paid");
        raw["order_ts"] = json!("yesterday");
        assert_eq!(schema_field(validate_payload(Entity::Orders, Operation::Insert, &raw)), "order_ts");

        raw["order_ts"] = json!("2026-01-01T00:00:00+02:00");
        match validate_change::<OrderRecord>(Operation::Insert, &raw).unwrap() {
            Change::Insert(o) => {
                assert_eq!(o.status, OrderStatus::Paid);
                assert_eq!(o.order_ts.to_rfc3339(), "2025-12-31T22:00:00+00:00");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
