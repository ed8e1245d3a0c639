use std::collections::BTreeMap;
use std::fmt;

use cdc_schemas::{Entity, RowCounts, ValidationError};
use serde::Serialize;

/// Per-entity outcome of one merge pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EntityMergeStats {
    /// Fresh events routed to this entity.
    pub considered: usize,
    /// Events that mutated a row.
    pub applied: usize,
    /// Late events: known, recorded in the ledger, but not applied.
    pub late_skipped: usize,
}

/// What one call to [`crate::ReconcileEngine::merge`] did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Events newly considered this run (late ones included).
    pub processed_count: usize,
    pub applied_count: usize,
    pub late_count: usize,
    /// Repeated `event_id`s dropped inside the batch itself.
    pub duplicate_in_batch: usize,
    /// Events whose id was already in the ledger.
    pub already_applied: usize,
    pub per_entity: BTreeMap<Entity, EntityMergeStats>,
    /// Rows per entity after the merge.
    pub row_counts: RowCounts,
}

#[derive(Debug)]
pub enum MergeError {
    /// A payload failed its contract. The whole batch is rejected and nothing
    /// is persisted; fix upstream data and re-run.
    Validation {
        event_id: String,
        source: ValidationError,
    },
    /// Loading or persisting state failed.
    Store(anyhow::Error),
}

impl MergeError {
    /// Stable class name for operator-facing output.
    pub fn class(&self) -> &'static str {
        match self {
            MergeError::Validation {
                source: ValidationError::Schema(_),
                ..
            } => "SchemaError",
            MergeError::Validation {
                source: ValidationError::UnsupportedOperation(_),
                ..
            } => "UnsupportedOperationError",
            MergeError::Store(_) => "StoreError",
        }
    }

    pub fn entity(&self) -> Option<Entity> {
        match self {
            MergeError::Validation { source, .. } => Some(source.entity()),
            MergeError::Store(_) => None,
        }
    }
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::Validation { event_id, source } => {
                write!(f, "merge rejected at event {event_id}: {source}")
            }
            MergeError::Store(e) => write!(f, "state store failure: {e:#}"),
        }
    }
}

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MergeError::Validation { source, .. } => Some(source),
            MergeError::Store(e) => Some(e.as_ref()),
        }
    }
}

impl From<anyhow::Error> for MergeError {
    fn from(e: anyhow::Error) -> Self {
        MergeError::Store(e)
    }
}
