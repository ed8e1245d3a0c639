//! cdc-schemas
//!
//! Shared data model for CDC reconciliation:
//! - [`Event`]: an immutable change fact (insert / update / delete) for one entity row
//! - typed payload records per entity and operation (`payload.rs`)
//! - typed current-state rows plus bookkeeping columns (`row.rs`)
//! - the payload contract enforced at the boundary (`validate.rs`)
//!
//! Pure types and pure functions. No IO.

mod event;
mod payload;
mod row;
mod validate;

pub use event::{Entity, Event, Operation, UnknownEntity};
pub use payload::{
    DeleteMode, DeletePayload, InsertOnly, OrderInsert, OrderItemInsert, OrderStatus, OrderUpdate,
    PaymentInsert, PaymentUpdate, ProductInsert, ProductUpdate, UserInsert, UserUpdate,
};
pub use row::{
    CurrentState, DedupLedger, EntityRecord, OrderItemRecord, OrderRecord, PaymentRecord,
    ProductRecord, RowCounts, StateRow, Table, UserRecord,
};
pub use validate::{
    validate_change, validate_payload, Change, FieldKind, FieldRule, Payload, SchemaError,
    UnsupportedOperationError, ValidationError, DELETE_FIELDS,
};
