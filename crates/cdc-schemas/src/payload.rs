//! Typed payload records, one per (entity, operation) pair.
//!
//! These are only ever produced by the validator, after the raw payload has
//! passed the closed-schema and bounds checks, so every instance is known to
//! honour the entity contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Paid,
    Shipped,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const NAMES: &'static [&'static str] =
        &["created", "paid", "shipped", "cancelled", "refunded"];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    #[default]
    Soft,
    Hard,
}

impl DeleteMode {
    pub const NAMES: &'static [&'static str] = &["soft", "hard"];
}

// ---------------------------------------------------------------------------
// Delete (shared by every mutable entity)
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeletePayload {
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_deleted: bool,
    #[serde(default)]
    pub delete_mode: DeleteMode,
}

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserInsert {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub region: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub updated_at: DateTime<Utc>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub region: Option<String>,
    pub is_deleted: Option<bool>,
}

// ---------------------------------------------------------------------------
// products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductInsert {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductUpdate {
    pub updated_at: DateTime<Utc>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub is_deleted: Option<bool>,
}

// ---------------------------------------------------------------------------
// orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderInsert {
    pub order_id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub order_ts: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderUpdate {
    pub updated_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub order_ts: Option<DateTime<Utc>>,
    pub is_deleted: Option<bool>,
}

// ---------------------------------------------------------------------------
// order_items (insert only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderItemInsert {
    pub order_item_id: String,
    pub order_id: String,
    pub product_id: String,
    pub qty: i64,
    pub unit_price: f64,
    pub created_at: DateTime<Utc>,
}

/// Update type for insert-only entities. Uninhabited: no value can exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InsertOnly {}

// ---------------------------------------------------------------------------
// payments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentInsert {
    pub payment_id: String,
    pub order_id: String,
    pub method: String,
    pub amount: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentUpdate {
    pub updated_at: DateTime<Utc>,
    pub method: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<String>,
}
