//! Command handlers for the `cdc` binary.
//!
//! Shared context loading, output, and error classification live here.
//! Pipeline commands live in `run`.

pub mod run;

use std::path::{Path, PathBuf};

use anyhow::Result;
use cdc_config::{
    load_layered_yaml, report_unused_keys, LoadedConfig, Settings, UnusedKeyPolicy,
};
use cdc_quality::QualityError;
use cdc_reconcile::MergeError;
use cdc_runtime::RunError;
use cdc_store::{FileMetricsHistory, MetricsHistory};
use serde::Serialize;
use tracing::warn;

/// Loaded configuration plus the settings derived from it.
pub struct Context {
    pub loaded: LoadedConfig,
    pub settings: Settings,
}

impl Context {
    pub fn load(project_root: &Path, config_paths: &[PathBuf], strict: bool) -> Result<Self> {
        let loaded = if config_paths.is_empty() {
            LoadedConfig::empty()?
        } else {
            load_layered_yaml(config_paths)?
        };

        let policy = if strict {
            UnusedKeyPolicy::Fail
        } else {
            UnusedKeyPolicy::Warn
        };
        let report = report_unused_keys(&loaded.config_json, policy)?;
        for p in report.unused_leaf_pointers.iter().take(50) {
            warn!(pointer = %p, "CONFIG_UNUSED_KEYS");
        }

        let settings = Settings::from_config_json(project_root, &loaded.config_json)?;
        Ok(Self { loaded, settings })
    }

    pub fn history(&self) -> FileMetricsHistory {
        FileMetricsHistory::new(&self.settings.metrics_dir)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Small commands
// ---------------------------------------------------------------------------

pub fn config_hash(paths: &[PathBuf]) -> Result<()> {
    let loaded = load_layered_yaml(paths)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}

pub fn history(ctx: &Context, limit: usize) -> Result<()> {
    let records = ctx.history().recent(limit)?;
    print_json(&records)
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Error class name for stderr and the process exit status.
pub fn classify(err: &anyhow::Error) -> (&'static str, u8) {
    if let Some(run) = err.downcast_ref::<RunError>() {
        let code = match run {
            RunError::GateFailedAfterMerge { .. } => crate::EXIT_GATE_FAILED_AFTER_MERGE,
            _ => 1,
        };
        return (run.class(), code);
    }
    if let Some(merge) = err.downcast_ref::<MergeError>() {
        return (merge.class(), 1);
    }
    if let Some(quality) = err.downcast_ref::<QualityError>() {
        return (quality.class(), 1);
    }
    ("Error", 1)
}
