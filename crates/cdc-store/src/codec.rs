//! Table and ledger encoding shared by every store.
//!
//! Tables are a pretty-printed JSON array of rows ordered by primary key;
//! the ledger is a JSON array of sorted event ids. Both end with a newline.
//! The same state always encodes to the same bytes.

use anyhow::{bail, Result};
use cdc_schemas::{DedupLedger, EntityRecord, StateRow, Table};

pub(crate) fn encode_table<R: EntityRecord>(table: &Table<R>) -> Result<Vec<u8>> {
    let rows: Vec<&StateRow<R>> = table.values().collect();
    let mut out = serde_json::to_vec_pretty(&rows)?;
    out.push(b'\n');
    Ok(out)
}

pub(crate) fn decode_table<R: EntityRecord>(bytes: &[u8]) -> Result<Table<R>> {
    let rows: Vec<StateRow<R>> = serde_json::from_slice(bytes)?;
    let mut table = Table::new();
    for row in rows {
        let key = row.record.primary_key().to_string();
        if table.insert(key.clone(), row).is_some() {
            bail!("duplicate primary key '{key}' in stored {} table", R::ENTITY);
        }
    }
    Ok(table)
}

pub(crate) fn encode_ledger(ledger: &DedupLedger) -> Result<Vec<u8>> {
    let mut out = serde_json::to_vec_pretty(ledger)?;
    out.push(b'\n');
    Ok(out)
}

pub(crate) fn decode_ledger(bytes: &[u8]) -> Result<DedupLedger> {
    Ok(serde_json::from_slice(bytes)?)
}
