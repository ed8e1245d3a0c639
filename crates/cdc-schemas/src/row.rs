//! Current-state rows.
//!
//! Each entity table is an ordered map keyed by primary key; each row holds
//! the typed entity record plus the bookkeeping columns `_last_event_ts`,
//! `_last_event_id` and `_schema_version`. Tables of different entities
//! never share keys, so each one is an independent arena.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::event::{Entity, Event};
use crate::payload::{
    DeleteMode, InsertOnly, OrderInsert, OrderItemInsert, OrderStatus, OrderUpdate, PaymentInsert,
    PaymentUpdate, ProductInsert, ProductUpdate, UserInsert, UserUpdate,
};
use crate::validate::{FieldKind, FieldRule};

/// Per-entity row counts, in canonical entity order.
pub type RowCounts = BTreeMap<Entity, usize>;

/// One entity's current-state table, keyed by primary key.
pub type Table<R> = BTreeMap<String, StateRow<R>>;

// ---------------------------------------------------------------------------
// Entity record contract
// ---------------------------------------------------------------------------

/// Binds an entity to its row shape, its payload types and its field contract.
///
/// The reconciliation engine and the stores are generic over this trait, so
/// every entity goes through the same merge path with its own types.
pub trait EntityRecord: Debug + Clone + PartialEq + Serialize + DeserializeOwned {
    const ENTITY: Entity;
    /// `false` for insert-only entities: updates and deletes are rejected.
    const MUTABLE: bool;
    const INSERT_FIELDS: &'static [FieldRule];
    const UPDATE_FIELDS: &'static [FieldRule];

    type Insert: Debug + Clone + PartialEq + DeserializeOwned;
    type Update: Debug + Clone + PartialEq + DeserializeOwned;

    /// Empty record carrying only the primary key.
    fn keyed(primary_key: &str) -> Self;
    fn primary_key(&self) -> &str;
    fn insert_key(insert: &Self::Insert) -> &str;
    fn from_insert(insert: Self::Insert) -> Self;
    /// Value of `is_deleted` carried by an insert payload.
    fn insert_is_deleted(_insert: &Self::Insert) -> bool {
        false
    }
    /// Shallow-merge present fields. Returns the payload's `is_deleted`, if any.
    fn apply_update(&mut self, update: Self::Update) -> Option<bool>;
    fn set_updated_at(&mut self, ts: DateTime<Utc>);

    fn table(state: &CurrentState) -> &Table<Self>;
    fn table_mut(state: &mut CurrentState) -> &mut Table<Self>;
}

// ---------------------------------------------------------------------------
// State row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRow<R> {
    #[serde(flatten)]
    pub record: R,
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_mode: Option<DeleteMode>,
    #[serde(rename = "_last_event_ts", default)]
    pub last_event_ts: Option<DateTime<Utc>>,
    #[serde(rename = "_last_event_id", default)]
    pub last_event_id: Option<String>,
    #[serde(rename = "_schema_version", default)]
    pub schema_version: Option<u32>,
}

impl<R: EntityRecord> StateRow<R> {
    /// Synthetic row for a key with no state yet.
    pub fn keyed(primary_key: &str) -> Self {
        Self::fresh(R::keyed(primary_key), false)
    }

    pub fn fresh(record: R, is_deleted: bool) -> Self {
        Self {
            record,
            is_deleted,
            delete_mode: None,
            last_event_ts: None,
            last_event_id: None,
            schema_version: None,
        }
    }

    /// Record which event produced the current row contents.
    pub fn stamp(&mut self, event: &Event) {
        self.last_event_ts = Some(event.event_ts);
        self.last_event_id = Some(event.event_id.clone());
        self.schema_version = Some(event.schema_version);
    }

    /// `true` when `event_ts` is strictly older than what this row already reflects.
    pub fn is_newer_than(&self, event_ts: DateTime<Utc>) -> bool {
        self.last_event_ts.is_some_and(|last| last > event_ts)
    }
}

// ---------------------------------------------------------------------------
// Whole-state view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentState {
    pub users: Table<UserRecord>,
    pub products: Table<ProductRecord>,
    pub orders: Table<OrderRecord>,
    pub order_items: Table<OrderItemRecord>,
    pub payments: Table<PaymentRecord>,
}

impl CurrentState {
    pub fn row_count(&self, entity: Entity) -> usize {
        match entity {
            Entity::Users => self.users.len(),
            Entity::Products => self.products.len(),
            Entity::Orders => self.orders.len(),
            Entity::OrderItems => self.order_items.len(),
            Entity::Payments => self.payments.len(),
        }
    }

    pub fn row_counts(&self) -> RowCounts {
        Entity::ALL
            .into_iter()
            .map(|e| (e, self.row_count(e)))
            .collect()
    }

    /// Latest `_last_event_ts` across every row of every table.
    pub fn latest_event_ts(&self) -> Option<DateTime<Utc>> {
        fn latest<R>(t: &Table<R>) -> Option<DateTime<Utc>> {
            t.values().filter_map(|r| r.last_event_ts).max()
        }
        [
            latest(&self.users),
            latest(&self.products),
            latest(&self.orders),
            latest(&self.order_items),
            latest(&self.payments),
        ]
        .into_iter()
        .flatten()
        .max()
    }
}

// ---------------------------------------------------------------------------
// Dedup ledger
// ---------------------------------------------------------------------------

/// Every event id ever applied. Presence means "already considered".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupLedger(BTreeSet<String>);

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.0.contains(event_id)
    }

    /// Returns `true` if the id was not yet recorded.
    pub fn record(&mut self, event_id: impl Into<String>) -> bool {
        self.0.insert(event_id.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for DedupLedger {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for DedupLedger {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub region: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntityRecord for UserRecord {
    const ENTITY: Entity = Entity::Users;
    const MUTABLE: bool = true;
    const INSERT_FIELDS: &'static [FieldRule] = &[
        FieldRule::required("user_id", FieldKind::Text),
        FieldRule::required("name", FieldKind::Text),
        FieldRule::required("email", FieldKind::Text),
        FieldRule::required("region", FieldKind::Text),
        FieldRule::required("created_at", FieldKind::Timestamp),
        FieldRule::required("updated_at", FieldKind::Timestamp),
        FieldRule::optional("is_deleted", FieldKind::Bool),
    ];
    const UPDATE_FIELDS: &'static [FieldRule] = &[
        FieldRule::required("updated_at", FieldKind::Timestamp),
        FieldRule::optional("name", FieldKind::Text),
        FieldRule::optional("email", FieldKind::Text),
        FieldRule::optional("region", FieldKind::Text),
        FieldRule::optional("is_deleted", FieldKind::Bool),
    ];

    type Insert = UserInsert;
    type Update = UserUpdate;

    fn keyed(primary_key: &str) -> Self {
        Self {
            user_id: primary_key.to_string(),
            name: None,
            email: None,
            region: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn primary_key(&self) -> &str {
        &self.user_id
    }

    fn insert_key(insert: &UserInsert) -> &str {
        &insert.user_id
    }

    fn from_insert(i: UserInsert) -> Self {
        Self {
            user_id: i.user_id,
            name: Some(i.name),
            email: Some(i.email),
            region: Some(i.region),
            created_at: Some(i.created_at),
            updated_at: Some(i.updated_at),
        }
    }

    fn insert_is_deleted(insert: &UserInsert) -> bool {
        insert.is_deleted
    }

    fn apply_update(&mut self, u: UserUpdate) -> Option<bool> {
        self.updated_at = Some(u.updated_at);
        if u.name.is_some() {
            self.name = u.name;
        }
        if u.email.is_some() {
            self.email = u.email;
        }
        if u.region.is_some() {
            self.region = u.region;
        }
        u.is_deleted
    }

    fn set_updated_at(&mut self, ts: DateTime<Utc>) {
        self.updated_at = Some(ts);
    }

    fn table(state: &CurrentState) -> &Table<Self> {
        &state.users
    }

    fn table_mut(state: &mut CurrentState) -> &mut Table<Self> {
        &mut state.users
    }
}

// ---------------------------------------------------------------------------
// products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntityRecord for ProductRecord {
    const ENTITY: Entity = Entity::Products;
    const MUTABLE: bool = true;
    const INSERT_FIELDS: &'static [FieldRule] = &[
        FieldRule::required("product_id", FieldKind::Text),
        FieldRule::required("name", FieldKind::Text),
        FieldRule::required("category", FieldKind::Text),
        FieldRule::required("price", FieldKind::Float { min: None }),
        FieldRule::required("currency", FieldKind::Text),
        FieldRule::required("created_at", FieldKind::Timestamp),
        FieldRule::required("updated_at", FieldKind::Timestamp),
        FieldRule::optional("is_deleted", FieldKind::Bool),
    ];
    const UPDATE_FIELDS: &'static [FieldRule] = &[
        FieldRule::required("updated_at", FieldKind::Timestamp),
        FieldRule::optional("name", FieldKind::Text),
        FieldRule::optional("category", FieldKind::Text),
        FieldRule::optional("price", FieldKind::Float { min: None }),
        FieldRule::optional("currency", FieldKind::Text),
        FieldRule::optional("is_deleted", FieldKind::Bool),
    ];

    type Insert = ProductInsert;
    type Update = ProductUpdate;

    fn keyed(primary_key: &str) -> Self {
        Self {
            product_id: primary_key.to_string(),
            name: None,
            category: None,
            price: None,
            currency: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn primary_key(&self) -> &str {
        &self.product_id
    }

    fn insert_key(insert: &ProductInsert) -> &str {
        &insert.product_id
    }

    fn from_insert(i: ProductInsert) -> Self {
        Self {
            product_id: i.product_id,
            name: Some(i.name),
            category: Some(i.category),
            price: Some(i.price),
            currency: Some(i.currency),
            created_at: Some(i.created_at),
            updated_at: Some(i.updated_at),
        }
    }

    fn insert_is_deleted(insert: &ProductInsert) -> bool {
        insert.is_deleted
    }

    fn apply_update(&mut self, u: ProductUpdate) -> Option<bool> {
        self.updated_at = Some(u.updated_at);
        if u.name.is_some() {
            self.name = u.name;
        }
        if u.category.is_some() {
            self.category = u.category;
        }
        if u.price.is_some() {
            self.price = u.price;
        }
        if u.currency.is_some() {
            self.currency = u.currency;
        }
        u.is_deleted
    }

    fn set_updated_at(&mut self, ts: DateTime<Utc>) {
        self.updated_at = Some(ts);
    }

    fn table(state: &CurrentState) -> &Table<Self> {
        &state.products
    }

    fn table_mut(state: &mut CurrentState) -> &mut Table<Self> {
        &mut state.products
    }
}

// ---------------------------------------------------------------------------
// orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub order_ts: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntityRecord for OrderRecord {
    const ENTITY: Entity = Entity::Orders;
    const MUTABLE: bool = true;
    const INSERT_FIELDS: &'static [FieldRule] = &[
        FieldRule::required("order_id", FieldKind::Text),
        FieldRule::required("user_id", FieldKind::Text),
        FieldRule::required("status", FieldKind::OneOf(OrderStatus::NAMES)),
        FieldRule::required("order_ts", FieldKind::Timestamp),
        FieldRule::required("updated_at", FieldKind::Timestamp),
        FieldRule::optional("is_deleted", FieldKind::Bool),
    ];
    const UPDATE_FIELDS: &'static [FieldRule] = &[
        FieldRule::required("updated_at", FieldKind::Timestamp),
        FieldRule::optional("user_id", FieldKind::Text),
        FieldRule::optional("status", FieldKind::OneOf(OrderStatus::NAMES)),
        FieldRule::optional("order_ts", FieldKind::Timestamp),
        FieldRule::optional("is_deleted", FieldKind::Bool),
    ];

    type Insert = OrderInsert;
    type Update = OrderUpdate;

    fn keyed(primary_key: &str) -> Self {
        Self {
            order_id: primary_key.to_string(),
            user_id: None,
            status: None,
            order_ts: None,
            updated_at: None,
        }
    }

    fn primary_key(&self) -> &str {
        &self.order_id
    }

    fn insert_key(insert: &OrderInsert) -> &str {
        &insert.order_id
    }

    fn from_insert(i: OrderInsert) -> Self {
        Self {
            order_id: i.order_id,
            user_id: Some(i.user_id),
            status: Some(i.status),
            order_ts: Some(i.order_ts),
            updated_at: Some(i.updated_at),
        }
    }

    fn insert_is_deleted(insert: &OrderInsert) -> bool {
        insert.is_deleted
    }

    fn apply_update(&mut self, u: OrderUpdate) -> Option<bool> {
        self.updated_at = Some(u.updated_at);
        if u.user_id.is_some() {
            self.user_id = u.user_id;
        }
        if u.status.is_some() {
            self.status = u.status;
        }
        if u.order_ts.is_some() {
            self.order_ts = u.order_ts;
        }
        u.is_deleted
    }

    fn set_updated_at(&mut self, ts: DateTime<Utc>) {
        self.updated_at = Some(ts);
    }

    fn table(state: &CurrentState) -> &Table<Self> {
        &state.orders
    }

    fn table_mut(state: &mut CurrentState) -> &mut Table<Self> {
        &mut state.orders
    }
}

// ---------------------------------------------------------------------------
// order_items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub order_item_id: String,
    pub order_id: Option<String>,
    pub product_id: Option<String>,
    pub qty: Option<i64>,
    pub unit_price: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl EntityRecord for OrderItemRecord {
    const ENTITY: Entity = Entity::OrderItems;
    const MUTABLE: bool = false;
    const INSERT_FIELDS: &'static [FieldRule] = &[
        FieldRule::required("order_item_id", FieldKind::Text),
        FieldRule::required("order_id", FieldKind::Text),
        FieldRule::required("product_id", FieldKind::Text),
        FieldRule::required("qty", FieldKind::Int { min: Some(1) }),
        FieldRule::required("unit_price", FieldKind::Float { min: Some(0.0) }),
        FieldRule::required("created_at", FieldKind::Timestamp),
    ];
    const UPDATE_FIELDS: &'static [FieldRule] = &[];

    type Insert = OrderItemInsert;
    type Update = InsertOnly;

    fn keyed(primary_key: &str) -> Self {
        Self {
            order_item_id: primary_key.to_string(),
            order_id: None,
            product_id: None,
            qty: None,
            unit_price: None,
            created_at: None,
        }
    }

    fn primary_key(&self) -> &str {
        &self.order_item_id
    }

    fn insert_key(insert: &OrderItemInsert) -> &str {
        &insert.order_item_id
    }

    fn from_insert(i: OrderItemInsert) -> Self {
        Self {
            order_item_id: i.order_item_id,
            order_id: Some(i.order_id),
            product_id: Some(i.product_id),
            qty: Some(i.qty),
            unit_price: Some(i.unit_price),
            created_at: Some(i.created_at),
        }
    }

    fn apply_update(&mut self, update: InsertOnly) -> Option<bool> {
        match update {}
    }

    // Line items carry no update timestamp; deletes are rejected upstream.
    fn set_updated_at(&mut self, _ts: DateTime<Utc>) {}

    fn table(state: &CurrentState) -> &Table<Self> {
        &state.order_items
    }

    fn table_mut(state: &mut CurrentState) -> &mut Table<Self> {
        &mut state.order_items
    }
}

// ---------------------------------------------------------------------------
// payments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub order_id: Option<String>,
    pub method: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntityRecord for PaymentRecord {
    const ENTITY: Entity = Entity::Payments;
    const MUTABLE: bool = true;
    const INSERT_FIELDS: &'static [FieldRule] = &[
        FieldRule::required("payment_id", FieldKind::Text),
        FieldRule::required("order_id", FieldKind::Text),
        FieldRule::required("method", FieldKind::Text),
        FieldRule::required("amount", FieldKind::Float { min: Some(0.0) }),
        FieldRule::required("status", FieldKind::Text),
        FieldRule::required("created_at", FieldKind::Timestamp),
        FieldRule::required("updated_at", FieldKind::Timestamp),
    ];
    const UPDATE_FIELDS: &'static [FieldRule] = &[
        FieldRule::required("updated_at", FieldKind::Timestamp),
        FieldRule::optional("method", FieldKind::Text),
        FieldRule::optional("amount", FieldKind::Float { min: Some(0.0) }),
        FieldRule::optional("status", FieldKind::Text),
    ];

    type Insert = PaymentInsert;
    type Update = PaymentUpdate;

    fn keyed(primary_key: &str) -> Self {
        Self {
            payment_id: primary_key.to_string(),
            order_id: None,
            method: None,
            amount: None,
            status: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn primary_key(&self) -> &str {
        &self.payment_id
    }

    fn insert_key(insert: &PaymentInsert) -> &str {
        &insert.payment_id
    }

    fn from_insert(i: PaymentInsert) -> Self {
        Self {
            payment_id: i.payment_id,
            order_id: Some(i.order_id),
            method: Some(i.method),
            amount: Some(i.amount),
            status: Some(i.status),
            created_at: Some(i.created_at),
            updated_at: Some(i.updated_at),
        }
    }

    fn apply_update(&mut self, u: PaymentUpdate) -> Option<bool> {
        self.updated_at = Some(u.updated_at);
        if u.method.is_some() {
            self.method = u.method;
        }
        if u.amount.is_some() {
            self.amount = u.amount;
        }
        if u.status.is_some() {
            self.status = u.status;
        }
        None
    }

    fn set_updated_at(&mut self, ts: DateTime<Utc>) {
        self.updated_at = Some(ts);
    }

    fn table(state: &CurrentState) -> &Table<Self> {
        &state.payments
    }

    fn table_mut(state: &mut CurrentState) -> &mut Table<Self> {
        &mut state.payments
    }
}
