use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entity types carried by the change stream.
///
/// Declaration order is the canonical processing and reporting order
/// (derived `Ord` drives every `BTreeMap<Entity, _>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Users,
    Products,
    Orders,
    OrderItems,
    Payments,
}

impl Entity {
    pub const ALL: [Entity; 5] = [
        Entity::Users,
        Entity::Products,
        Entity::Orders,
        Entity::OrderItems,
        Entity::Payments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Users => "users",
            Entity::Products => "products",
            Entity::Orders => "orders",
            Entity::OrderItems => "order_items",
            Entity::Payments => "payments",
        }
    }

    /// Name of the payload field that carries the row's primary key.
    pub fn primary_key_field(&self) -> &'static str {
        match self {
            Entity::Users => "user_id",
            Entity::Products => "product_id",
            Entity::Orders => "order_id",
            Entity::OrderItems => "order_item_id",
            Entity::Payments => "payment_id",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`Entity::from_str`] for names outside the closed entity set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntity(pub String);

impl fmt::Display for UnknownEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown entity '{}'. expected one of: users | products | orders | order_items | payments",
            self.0
        )
    }
}

impl std::error::Error for UnknownEntity {}

impl FromStr for Entity {
    type Err = UnknownEntity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim().to_ascii_lowercase();
        Entity::ALL
            .into_iter()
            .find(|e| e.as_str() == t)
            .ok_or_else(|| UnknownEntity(s.to_string()))
    }
}

/// Change kind. Wire codes are `I` / `U` / `D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "I", alias = "insert")]
    Insert,
    #[serde(rename = "U", alias = "update")]
    Update,
    #[serde(rename = "D", alias = "delete")]
    Delete,
}

impl Operation {
    pub fn code(&self) -> &'static str {
        match self {
            Operation::Insert => "I",
            Operation::Update => "U",
            Operation::Delete => "D",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Insert => f.write_str("insert"),
            Operation::Update => f.write_str("update"),
            Operation::Delete => f.write_str("delete"),
        }
    }
}

/// One change fact. Never mutated after emission.
///
/// `event_ts` is business time (UTC), not ingestion time. The payload stays
/// raw here; it is only given a type by the validator, at apply time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub entity: Entity,
    pub operation: Operation,
    pub event_ts: DateTime<Utc>,
    #[serde(rename = "pk", alias = "primary_key")]
    pub primary_key: String,
    pub payload: Value,
    pub schema_version: u32,
}

impl Event {
    /// Total order used for every batch: `(event_ts, event_id)` ascending.
    pub fn ordering_key(&self) -> (DateTime<Utc>, &str) {
        (self.event_ts, self.event_id.as_str())
    }
}
