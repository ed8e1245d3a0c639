use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use cdc_config::Settings;
use cdc_quality::{check, QualityConfig, QualityError};
use cdc_reconcile::ReconcileEngine;
use cdc_schemas::{Event, RowCounts};
use cdc_store::events::read_bronze_partition;
use cdc_store::{load_state, FileMetricsHistory, FileStore, MetricsHistory, RunMetrics, StateStore};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::RunError;

/// Pipeline over the configured state and metrics directories.
pub fn open_file_pipeline(
    settings: &Settings,
    config_hash: &str,
) -> Result<Pipeline<FileStore, FileMetricsHistory>> {
    let store = FileStore::open(&settings.state_dir)?;
    let history = FileMetricsHistory::new(&settings.metrics_dir);
    Ok(Pipeline::new(
        store,
        history,
        settings.quality.clone(),
        config_hash,
    ))
}

/// Event source reading the bronze partition of each run date.
pub fn bronze_source(bronze_dir: &Path) -> impl FnMut(NaiveDate) -> Result<Vec<Event>> + '_ {
    move |run_date| read_bronze_partition(bronze_dir, run_date)
}

pub struct Pipeline<S, H> {
    engine: ReconcileEngine<S>,
    history: H,
    quality: QualityConfig,
    config_hash: String,
}

impl<S: StateStore, H: MetricsHistory> Pipeline<S, H> {
    pub fn new(store: S, history: H, quality: QualityConfig, config_hash: impl Into<String>) -> Self {
        Self {
            engine: ReconcileEngine::new(store),
            history,
            quality,
            config_hash: config_hash.into(),
        }
    }

    pub fn store(&self) -> &S {
        self.engine.store()
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn quality(&self) -> &QualityConfig {
        &self.quality
    }

    /// One full run for `run_date`. The gate sees history from before this run.
    pub fn run_batch(&mut self, run_date: NaiveDate, events: &[Event]) -> Result<RunMetrics, RunError> {
        let started = Instant::now();

        let merge = self
            .engine
            .merge(events)
            .map_err(|source| RunError::Merge { run_date, source })?;
        let processed = merge.processed_count as u64;

        let (row_counts, freshness) = match self.gate(processed) {
            Ok(out) => out,
            Err(source) => {
                error!(
                    %run_date,
                    processed,
                    class = source.class(),
                    error = %source,
                    "quality gate failed after merge"
                );
                return Err(RunError::GateFailedAfterMerge {
                    run_date,
                    merge,
                    source,
                });
            }
        };

        let runtime_seconds = (started.elapsed().as_secs_f64() * 10_000.0).round() / 10_000.0;
        let metrics = RunMetrics {
            run_id: Uuid::new_v4(),
            run_date,
            processed_events_count: processed,
            runtime_seconds,
            output_row_counts: row_counts,
            config_hash: self.config_hash.clone(),
            finished_at: Some(Utc::now()),
            freshness,
        };
        self.history
            .append(&metrics)
            .map_err(|source| RunError::Metrics { run_date, source })?;

        info!(
            %run_date,
            run_id = %metrics.run_id,
            processed,
            runtime_seconds,
            "pipeline run completed"
        );
        Ok(metrics)
    }

    fn gate(&self, processed: u64) -> Result<(RowCounts, Option<DateTime<Utc>>), QualityError> {
        let state = load_state(self.engine.store())?;
        let history = self
            .history
            .recent_processed_counts(self.quality.history_window)?;
        let row_counts = check(&state, processed, &history, &self.quality)?;
        Ok((row_counts, state.latest_event_ts()))
    }

    /// Run every date in `start..=end` in order, stopping at the first failure.
    /// Runs completed before a failure stay persisted.
    pub fn backfill<F>(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        mut source: F,
    ) -> Result<Vec<RunMetrics>, RunError>
    where
        F: FnMut(NaiveDate) -> Result<Vec<Event>>,
    {
        if end < start {
            return Err(RunError::InvalidRange { start, end });
        }

        let mut out = Vec::new();
        for run_date in start.iter_days().take_while(|d| *d <= end) {
            let events =
                source(run_date).map_err(|source| RunError::Source { run_date, source })?;
            out.push(self.run_batch(run_date, &events)?);
        }

        info!(%start, %end, runs = out.len(), "backfill completed");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdc_schemas::{Entity, Operation};
    use cdc_store::{MemoryMetricsHistory, MemoryStore, LEDGER_BLOB};
    use cdc_testkit::{day, day_batch, event, ts};
    use serde_json::json;

    fn pipeline(history: MemoryMetricsHistory) -> Pipeline<MemoryStore, MemoryMetricsHistory> {
        Pipeline::new(MemoryStore::new(), history, QualityConfig::default(), "hash-1")
    }

    #[test]
    fn run_records_metrics() {
        let mut p = pipeline(MemoryMetricsHistory::new());
        let date = day("2026-02-01");
        let metrics = p.run_batch(date, &day_batch(date, 3)).unwrap();

        assert_eq!(metrics.processed_events_count, 12);
        assert_eq!(metrics.config_hash, "hash-1");
        assert_eq!(metrics.output_row_counts[&Entity::OrderItems], 3);
        assert_eq!(metrics.freshness, Some(ts("2026-02-01T08:02:02Z")));
        assert_eq!(p.history().records(), &[metrics]);
    }

    #[test]
    fn merge_error_persists_nothing() {
        let mut p = pipeline(MemoryMetricsHistory::new());
        let bad = event(
            "e1",
            Entity::Users,
            Operation::Insert,
            ts("2026-02-01T00:00:00Z"),
            "U1",
            json!({"user_id": "U1"}),
        );
        let err = p.run_batch(day("2026-02-01"), &[bad]).unwrap_err();
        assert_eq!(err.class(), "SchemaError");
        assert!(!err.merge_persisted());
        assert_eq!(p.store().write_count(), 0);
        assert!(p.history().records().is_empty());
    }

    #[test]
    fn gate_failure_after_merge_is_distinct() {
        let date = day("2026-02-06");
        let mut p = pipeline(MemoryMetricsHistory::with_processed_counts(
            day("2026-02-01"),
            &[100, 100, 100, 100, 100],
        ));

        // 100 orders → 400 events, above 3 × 100.
        let batch = day_batch(date, 100);
        let err = p.run_batch(date, &batch).unwrap_err();
        match &err {
            RunError::GateFailedAfterMerge { merge, source, .. } => {
                assert_eq!(merge.processed_count, 400);
                assert_eq!(source.class(), "AnomalyError");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.merge_persisted());
        assert!(p.store().blob(LEDGER_BLOB).is_some());
        assert_eq!(p.history().records().len(), 5);

        // Replaying the batch processes nothing, so the volume check is skipped.
        let retry = p.run_batch(date, &batch).unwrap();
        assert_eq!(retry.processed_events_count, 0);
    }

    #[test]
    fn backfill_runs_each_date_and_tolerates_empty_days() {
        let mut p = pipeline(MemoryMetricsHistory::new());
        let runs = p
            .backfill(day("2026-02-01"), day("2026-02-03"), |d| {
                Ok(if d == day("2026-02-02") {
                    Vec::new()
                } else {
                    day_batch(d, 2)
                })
            })
            .unwrap();

        let counts: Vec<u64> = runs.iter().map(|r| r.processed_events_count).collect();
        assert_eq!(counts, vec![8, 0, 8]);
        assert_eq!(runs[2].output_row_counts[&Entity::Users], 4);
    }

    #[test]
    fn backfill_rejects_reversed_range() {
        let mut p = pipeline(MemoryMetricsHistory::new());
        let err = p
            .backfill(day("2026-02-03"), day("2026-02-01"), |_| Ok(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidRange { .. }));
        assert_eq!(err.run_date(), None);
    }

    #[test]
    fn source_failure_stops_backfill() {
        let mut p = pipeline(MemoryMetricsHistory::new());
        let err = p
            .backfill(day("2026-02-01"), day("2026-02-03"), |d| {
                if d == day("2026-02-02") {
                    anyhow::bail!("partition unreadable")
                }
                Ok(day_batch(d, 1))
            })
            .unwrap_err();
        assert_eq!(err.class(), "SourceError");
        assert_eq!(err.run_date(), Some(day("2026-02-02")));
        assert_eq!(p.history().records().len(), 1);
    }
}
