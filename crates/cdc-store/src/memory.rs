use std::collections::BTreeMap;

use anyhow::Result;

use crate::StateStore;

/// In-process store holding the same encoded bytes a file store would write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    blobs: BTreeMap<String, Vec<u8>>,
    writes: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw encoded bytes for a blob (entity name or ledger), if written.
    pub fn blob(&self, name: &str) -> Option<&[u8]> {
        self.blobs.get(name).map(Vec::as_slice)
    }

    /// Number of `replace_blob` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes
    }
}

impl StateStore for MemoryStore {
    fn read_blob(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(name).cloned())
    }

    fn replace_blob(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.insert(name.to_string(), bytes.to_vec());
        self.writes += 1;
        Ok(())
    }
}
