//! cdc-quality
//!
//! Post-merge quality gate. Reads reconciled state and recent run history,
//! never writes either.
//!
//! Checks, in order, each fatal:
//! 1. core entity tables are non-empty
//! 2. foreign keys resolve (orders → users, order_items → orders/products)
//! 3. value ranges (qty > 0, unit_price ≥ 0, amount ≥ 0)
//! 4. processed volume within a band around the recent average

mod gate;
mod integrity;
mod types;
mod volume;

pub use gate::{check, QualityGate};
pub use integrity::check_integrity;
pub use types::*;
pub use volume::check_volume;
