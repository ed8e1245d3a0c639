use crate::{QualityConfig, VolumeAnomaly, VolumeBand, VolumeVerdict};

/// Compare `processed` against the trailing `history` (oldest first).
///
/// Only the last `history_window` samples count. The band is
/// `[max(lower_floor, lower_factor × avg), upper_factor × avg]`, both ends inclusive.
pub fn check_volume(
    processed: u64,
    history: &[u64],
    cfg: &QualityConfig,
) -> Result<VolumeVerdict, VolumeAnomaly> {
    if processed == 0 {
        return Ok(VolumeVerdict::SkippedNoEvents);
    }

    let window = &history[history.len().saturating_sub(cfg.history_window)..];
    if window.len() < cfg.min_history_samples || window.is_empty() {
        return Ok(VolumeVerdict::SkippedInsufficientHistory {
            samples: window.len(),
            required: cfg.min_history_samples,
        });
    }

    let average = window.iter().map(|n| *n as f64).sum::<f64>() / window.len() as f64;
    let band = VolumeBand {
        average,
        lower: (average * cfg.lower_factor).max(cfg.lower_floor),
        upper: average * cfg.upper_factor,
        samples: window.len(),
    };

    let count = processed as f64;
    if count > band.upper || count < band.lower {
        return Err(VolumeAnomaly { processed, band });
    }
    Ok(VolumeVerdict::WithinBand { processed, band })
}
