use std::fmt;

use cdc_quality::QualityError;
use cdc_reconcile::{MergeError, MergeReport};
use chrono::NaiveDate;

#[derive(Debug)]
pub enum RunError {
    /// Nothing was persisted.
    Merge { run_date: NaiveDate, source: MergeError },
    /// State was persisted, then the gate failed. Needs an operator before
    /// the next run is trusted.
    GateFailedAfterMerge {
        run_date: NaiveDate,
        merge: MergeReport,
        source: QualityError,
    },
    /// State was persisted and the gate passed, but the metrics record was not written.
    Metrics { run_date: NaiveDate, source: anyhow::Error },
    /// The event source could not produce a batch.
    Source { run_date: NaiveDate, source: anyhow::Error },
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

impl RunError {
    /// Stable class name for operator-facing output.
    pub fn class(&self) -> &'static str {
        match self {
            RunError::Merge { source, .. } => source.class(),
            RunError::GateFailedAfterMerge { source, .. } => source.class(),
            RunError::Metrics { .. } => "MetricsError",
            RunError::Source { .. } => "SourceError",
            RunError::InvalidRange { .. } => "InvalidRange",
        }
    }

    pub fn run_date(&self) -> Option<NaiveDate> {
        match self {
            RunError::Merge { run_date, .. }
            | RunError::GateFailedAfterMerge { run_date, .. }
            | RunError::Metrics { run_date, .. }
            | RunError::Source { run_date, .. } => Some(*run_date),
            RunError::InvalidRange { .. } => None,
        }
    }

    /// `true` when state on disk already reflects this run's events.
    pub fn merge_persisted(&self) -> bool {
        matches!(
            self,
            RunError::GateFailedAfterMerge { .. } | RunError::Metrics { .. }
        )
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Merge { run_date, source } => {
                write!(f, "run {run_date}: {source}")
            }
            RunError::GateFailedAfterMerge {
                run_date,
                merge,
                source,
            } => write!(
                f,
                "run {run_date}: merge persisted ({} events) but {source}; \
                 inspect state before the next run",
                merge.processed_count
            ),
            RunError::Metrics { run_date, source } => {
                write!(f, "run {run_date}: writing run metrics failed: {source:#}")
            }
            RunError::Source { run_date, source } => {
                write!(f, "run {run_date}: reading events failed: {source:#}")
            }
            RunError::InvalidRange { start, end } => write!(
                f,
                "end date {end} must be greater than or equal to start date {start}"
            ),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Merge { source, .. } => Some(source),
            RunError::GateFailedAfterMerge { source, .. } => Some(source),
            RunError::Metrics { source, .. } | RunError::Source { source, .. } => {
                Some(source.as_ref())
            }
            RunError::InvalidRange { .. } => None,
        }
    }
}
