use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cdc_schemas::RowCounts;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::file::write_atomic;

/// One record per completed run. Only `run_date` and
/// `processed_events_count` are required when reading older records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    #[serde(default)]
    pub run_id: Uuid,
    pub run_date: NaiveDate,
    pub processed_events_count: u64,
    #[serde(default)]
    pub runtime_seconds: f64,
    #[serde(default)]
    pub output_row_counts: RowCounts,
    #[serde(default)]
    pub config_hash: String,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Latest `_last_event_ts` across the reconciled tables after the run.
    #[serde(default)]
    pub freshness: Option<DateTime<Utc>>,
}

impl RunMetrics {
    /// Minimal record, as an external orchestrator might write it.
    pub fn minimal(run_date: NaiveDate, processed_events_count: u64) -> Self {
        Self {
            run_id: Uuid::nil(),
            run_date,
            processed_events_count,
            runtime_seconds: 0.0,
            output_row_counts: RowCounts::new(),
            config_hash: String::new(),
            finished_at: None,
            freshness: None,
        }
    }
}

/// Append-only log of prior runs.
pub trait MetricsHistory {
    /// Up to `limit` most recent records, oldest first.
    fn recent(&self, limit: usize) -> Result<Vec<RunMetrics>>;

    fn append(&mut self, record: &RunMetrics) -> Result<()>;

    fn recent_processed_counts(&self, limit: usize) -> Result<Vec<u64>> {
        Ok(self
            .recent(limit)?
            .into_iter()
            .map(|r| r.processed_events_count)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryMetricsHistory {
    records: Vec<RunMetrics>,
}

impl MemoryMetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processed_counts(run_date: NaiveDate, counts: &[u64]) -> Self {
        Self {
            records: counts
                .iter()
                .map(|c| RunMetrics::minimal(run_date, *c))
                .collect(),
        }
    }

    pub fn records(&self) -> &[RunMetrics] {
        &self.records
    }
}

impl MetricsHistory for MemoryMetricsHistory {
    fn recent(&self, limit: usize) -> Result<Vec<RunMetrics>> {
        let start = self.records.len().saturating_sub(limit);
        Ok(self.records[start..].to_vec())
    }

    fn append(&mut self, record: &RunMetrics) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed
// ---------------------------------------------------------------------------

/// One `run_<run_date>_<stamp>_<id>.json` file per run; file-name order is run order.
#[derive(Debug, Clone)]
pub struct FileMetricsHistory {
    dir: PathBuf,
}

impl FileMetricsHistory {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("list metrics dir failed: {}", self.dir.display()))
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("list {}", self.dir.display()))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("run_") && name.ends_with(".json") {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn record_file_name(record: &RunMetrics) -> String {
        let stamp = record
            .finished_at
            .unwrap_or_else(Utc::now)
            .format("%Y%m%dT%H%M%S%6f");
        let id = record.run_id.simple().to_string();
        format!("run_{}_{}_{}.json", record.run_date, stamp, &id[..8])
    }
}

impl MetricsHistory for FileMetricsHistory {
    /// Unreadable or malformed records are skipped, so fewer than `limit`
    /// records may come back even when more files exist.
    fn recent(&self, limit: usize) -> Result<Vec<RunMetrics>> {
        let paths = self.record_paths()?;
        let start = paths.len().saturating_sub(limit);

        let mut out = Vec::new();
        for path in &paths[start..] {
            let parsed = fs::read(path)
                .map_err(anyhow::Error::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<RunMetrics>(&bytes)?));
            match parsed {
                Ok(record) => out.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable run metrics record"),
            }
        }
        Ok(out)
    }

    fn append(&mut self, record: &RunMetrics) -> Result<()> {
        let path = self.dir.join(Self::record_file_name(record));
        let mut json = serde_json::to_vec_pretty(record).context("serialize run metrics failed")?;
        json.push(b'\n');
        write_atomic(&path, &json)
            .with_context(|| format!("write run metrics failed: {}", path.display()))
    }
}
