use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use cdc_quality::QualityConfig;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawPaths {
    data_root: PathBuf,
    state_dir: PathBuf,
    metrics_dir: PathBuf,
    bronze_dir: PathBuf,
}

impl Default for RawPaths {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            state_dir: PathBuf::from("silver"),
            metrics_dir: PathBuf::from("metrics"),
            bronze_dir: PathBuf::from("bronze"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    paths: RawPaths,
    quality: QualityConfig,
}

/// Resolved settings. Relative paths are anchored at the project root
/// (`data_root`) or at `data_root` (the three stores); absolute paths stay as given.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub project_root: PathBuf,
    pub data_root: PathBuf,
    pub state_dir: PathBuf,
    pub metrics_dir: PathBuf,
    pub bronze_dir: PathBuf,
    pub quality: QualityConfig,
}

impl Settings {
    pub fn from_config_json(project_root: impl AsRef<Path>, config_json: &Value) -> Result<Self> {
        let raw: RawConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: config does not match the settings schema")?;
        raw.quality
            .validate()
            .map_err(|reason| anyhow!("CONFIG_INVALID {reason}"))?;

        let project_root = project_root.as_ref().to_path_buf();
        let data_root = project_root.join(&raw.paths.data_root);
        Ok(Self {
            state_dir: data_root.join(&raw.paths.state_dir),
            metrics_dir: data_root.join(&raw.paths.metrics_dir),
            bronze_dir: data_root.join(&raw.paths.bronze_dir),
            data_root,
            project_root,
            quality: raw.quality,
        })
    }

    /// Every key at its default.
    pub fn defaults(project_root: impl AsRef<Path>) -> Self {
        let raw = RawConfig::default();
        let project_root = project_root.as_ref().to_path_buf();
        let data_root = project_root.join(&raw.paths.data_root);
        Self {
            state_dir: data_root.join(&raw.paths.state_dir),
            metrics_dir: data_root.join(&raw.paths.metrics_dir),
            bronze_dir: data_root.join(&raw.paths.bronze_dir),
            data_root,
            project_root,
            quality: raw.quality,
        }
    }
}
