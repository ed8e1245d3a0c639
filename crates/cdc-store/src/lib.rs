//! cdc-store
//!
//! Persistence seam for the reconciliation core.
//!
//! - [`StateStore`]: whole-table load / atomic replace for entity tables and
//!   the dedup ledger. [`MemoryStore`] for tests, [`FileStore`] for runs.
//! - [`MetricsHistory`]: append-only run-metrics log read by the quality gate.
//! - `events`: JSON Lines event batches and the bronze date-partition layout.
//!
//! Every run loads whole tables and rewrites them whole; cost is linear in
//! table size per run.

mod codec;
pub mod events;
mod file;
mod history;
mod memory;

use anyhow::{Context, Result};
use cdc_schemas::{
    CurrentState, DedupLedger, EntityRecord, OrderItemRecord, OrderRecord, PaymentRecord,
    ProductRecord, Table, UserRecord,
};

pub use file::{write_atomic, FileStore};
pub use history::{FileMetricsHistory, MemoryMetricsHistory, MetricsHistory, RunMetrics};
pub use memory::MemoryStore;

/// Blob name of the dedup ledger. Leading underscore keeps it apart from entity tables.
pub const LEDGER_BLOB: &str = "_processed_event_ids";

/// Whole-blob storage with atomic replace semantics.
///
/// Implementors provide the two byte-level primitives; the typed table and
/// ledger operations are provided on top so every store shares one encoding.
pub trait StateStore {
    /// `Ok(None)` when the blob was never written.
    fn read_blob(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob in one step: readers observe either the old or the new bytes.
    fn replace_blob(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Load one entity table; empty when absent.
    fn load_table<R: EntityRecord>(&self) -> Result<Table<R>>
    where
        Self: Sized,
    {
        let name = R::ENTITY.as_str();
        match self.read_blob(name)? {
            Some(bytes) => {
                codec::decode_table(&bytes).with_context(|| format!("decode table {name}"))
            }
            None => Ok(Table::new()),
        }
    }

    fn save_table<R: EntityRecord>(&mut self, table: &Table<R>) -> Result<()>
    where
        Self: Sized,
    {
        let name = R::ENTITY.as_str();
        let bytes = codec::encode_table(table).with_context(|| format!("encode table {name}"))?;
        self.replace_blob(name, &bytes)
    }

    fn load_ledger(&self) -> Result<DedupLedger>
    where
        Self: Sized,
    {
        match self.read_blob(LEDGER_BLOB)? {
            Some(bytes) => codec::decode_ledger(&bytes).context("decode dedup ledger"),
            None => Ok(DedupLedger::new()),
        }
    }

    fn save_ledger(&mut self, ledger: &DedupLedger) -> Result<()>
    where
        Self: Sized,
    {
        let bytes = codec::encode_ledger(ledger).context("encode dedup ledger")?;
        self.replace_blob(LEDGER_BLOB, &bytes)
    }
}

/// Load every entity table into one in-memory view.
pub fn load_state<S: StateStore>(store: &S) -> Result<CurrentState> {
    Ok(CurrentState {
        users: store.load_table::<UserRecord>()?,
        products: store.load_table::<ProductRecord>()?,
        orders: store.load_table::<OrderRecord>()?,
        order_items: store.load_table::<OrderItemRecord>()?,
        payments: store.load_table::<PaymentRecord>()?,
    })
}
