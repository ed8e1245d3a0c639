use std::path::Path;

use anyhow::{Context as _, Result};
use cdc_quality::QualityGate;
use cdc_reconcile::ReconcileEngine;
use cdc_runtime::{bronze_source, open_file_pipeline};
use cdc_store::events::{land_bronze_batch, read_bronze_partition, read_events_jsonl};
use cdc_store::FileStore;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use super::{print_json, Context};

pub fn merge(ctx: &Context, events_path: &Path) -> Result<()> {
    let events = read_events_jsonl(events_path)?;
    let store = FileStore::open(&ctx.settings.state_dir)?;
    let mut engine = ReconcileEngine::new(store);
    let report = engine.merge(&events)?;
    print_json(&report)
}

#[derive(Serialize)]
struct CheckOutput {
    processed: u64,
    row_counts: cdc_schemas::RowCounts,
}

pub fn check(ctx: &Context, processed: u64) -> Result<()> {
    let store = FileStore::open(&ctx.settings.state_dir)?;
    let gate = QualityGate::new(ctx.settings.quality.clone());
    let row_counts = gate.run(&store, &ctx.history(), processed)?;
    print_json(&CheckOutput {
        processed,
        row_counts,
    })
}

pub fn run(ctx: &Context, date: NaiveDate, events_path: Option<&Path>, land: bool) -> Result<()> {
    let events = match events_path {
        Some(path) => {
            let events = read_events_jsonl(path)?;
            if land {
                let landed = land_bronze_batch(&ctx.settings.bronze_dir, date, &events)
                    .with_context(|| format!("landing batch for {date}"))?;
                info!(path = %landed.display(), events = events.len(), "batch landed");
            }
            events
        }
        None => read_bronze_partition(&ctx.settings.bronze_dir, date)?,
    };

    let mut pipeline = open_file_pipeline(&ctx.settings, &ctx.loaded.config_hash)?;
    let metrics = pipeline.run_batch(date, &events)?;
    print_json(&metrics)
}

pub fn backfill(ctx: &Context, start: NaiveDate, end: NaiveDate) -> Result<()> {
    let mut pipeline = open_file_pipeline(&ctx.settings, &ctx.loaded.config_hash)?;
    let runs = pipeline.backfill(start, end, bronze_source(&ctx.settings.bronze_dir))?;
    print_json(&runs)
}
