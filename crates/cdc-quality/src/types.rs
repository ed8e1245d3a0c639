use std::fmt;

use cdc_schemas::Entity;
use serde::{Deserialize, Serialize};

/// Gate thresholds. `Default` is the production policy; the `quality`
/// config section deserializes straight into it, missing keys defaulted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Entities whose current-state table must be non-empty after a merge.
    pub core_entities: Vec<Entity>,
    /// Most recent run records considered by the volume check.
    pub history_window: usize,
    /// Below this many samples the volume check is skipped.
    pub min_history_samples: usize,
    pub upper_factor: f64,
    pub lower_factor: f64,
    /// Absolute minimum of the lower bound.
    pub lower_floor: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            core_entities: vec![Entity::Users, Entity::Products, Entity::Orders],
            history_window: 10,
            min_history_samples: 3,
            upper_factor: 3.0,
            lower_factor: 0.25,
            lower_floor: 1.0,
        }
    }
}

impl QualityConfig {
    /// Rejects thresholds the checks cannot work with; names the offending key.
    pub fn validate(&self) -> Result<(), String> {
        if self.history_window == 0 {
            return Err("quality.history_window must be at least 1".into());
        }
        if self.min_history_samples == 0 {
            return Err("quality.min_history_samples must be at least 1".into());
        }
        if !(self.upper_factor.is_finite() && self.upper_factor > 0.0) {
            return Err("quality.upper_factor must be a positive number".into());
        }
        for (name, v) in [
            ("lower_factor", self.lower_factor),
            ("lower_floor", self.lower_floor),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(format!("quality.{name} must be a non-negative number"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Integrity
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum IntegrityViolation {
    EmptyCoreTable {
        entity: Entity,
    },
    /// Distinct referenced keys absent from the target table.
    MissingReferences {
        entity: Entity,
        field: &'static str,
        target: Entity,
        missing: usize,
        /// Up to a handful of the missing keys, sorted.
        sample: Vec<String>,
    },
    InvalidValue {
        entity: Entity,
        field: &'static str,
        rule: &'static str,
        /// Rows breaking the rule.
        rows: usize,
        /// Smallest offending primary key.
        first_pk: String,
    },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityViolation::EmptyCoreTable { entity } => {
                write!(f, "{entity} current-state table is empty")
            }
            IntegrityViolation::MissingReferences {
                entity,
                field,
                target,
                missing,
                sample,
            } => write!(
                f,
                "{entity}.{field} references missing {target} ({missing} keys, e.g. {})",
                sample.join(", ")
            ),
            IntegrityViolation::InvalidValue {
                entity,
                field,
                rule,
                rows,
                first_pk,
            } => write!(
                f,
                "{entity}.{field} must be {rule} ({rows} rows, first {first_pk})"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Volume
// ---------------------------------------------------------------------------

/// Accepted band for a run's processed count.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VolumeBand {
    pub average: f64,
    pub lower: f64,
    pub upper: f64,
    pub samples: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum VolumeVerdict {
    /// Nothing new was processed.
    SkippedNoEvents,
    SkippedInsufficientHistory { samples: usize, required: usize },
    WithinBand { processed: u64, band: VolumeBand },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeAnomaly {
    pub processed: u64,
    pub band: VolumeBand,
}

impl fmt::Display for VolumeAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed event volume outside expected range (count={}, lower={:.2}, upper={:.2}, avg={:.2} over {} runs)",
            self.processed, self.band.lower, self.band.upper, self.band.average, self.band.samples
        )
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum QualityError {
    Integrity(IntegrityViolation),
    Anomaly(VolumeAnomaly),
    /// Reading state or history failed; no verdict was reached.
    Store(anyhow::Error),
}

impl QualityError {
    /// Stable class name for operator-facing output.
    pub fn class(&self) -> &'static str {
        match self {
            QualityError::Integrity(_) => "IntegrityError",
            QualityError::Anomaly(_) => "AnomalyError",
            QualityError::Store(_) => "StoreError",
        }
    }
}

impl fmt::Display for QualityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityError::Integrity(v) => write!(f, "quality check failed: {v}"),
            QualityError::Anomaly(a) => write!(f, "quality check failed: {a}"),
            QualityError::Store(e) => write!(f, "quality gate could not read inputs: {e:#}"),
        }
    }
}

impl std::error::Error for QualityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QualityError::Store(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<IntegrityViolation> for QualityError {
    fn from(v: IntegrityViolation) -> Self {
        QualityError::Integrity(v)
    }
}

impl From<VolumeAnomaly> for QualityError {
    fn from(a: VolumeAnomaly) -> Self {
        QualityError::Anomaly(a)
    }
}

impl From<anyhow::Error> for QualityError {
    fn from(e: anyhow::Error) -> Self {
        QualityError::Store(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_section_keeps_default_thresholds() {
        let cfg: QualityConfig =
            serde_json::from_value(json!({"upper_factor": 4.0, "core_entities": ["orders"]}))
                .unwrap();
        assert_eq!(cfg.upper_factor, 4.0);
        assert_eq!(cfg.core_entities, vec![Entity::Orders]);
        assert_eq!(cfg.lower_factor, QualityConfig::default().lower_factor);
        assert_eq!(cfg.min_history_samples, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_names_the_bad_threshold() {
        let cfg = QualityConfig {
            lower_floor: -1.0,
            ..QualityConfig::default()
        };
        assert!(cfg.validate().unwrap_err().contains("lower_floor"));

        let cfg = QualityConfig {
            min_history_samples: 0,
            ..QualityConfig::default()
        };
        assert!(cfg.validate().unwrap_err().contains("min_history_samples"));
    }
}
