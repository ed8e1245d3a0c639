use cdc_schemas::{CurrentState, RowCounts};
use cdc_store::{load_state, MetricsHistory, StateStore};
use tracing::{info, warn};

use crate::{check_integrity, check_volume, QualityConfig, QualityError, VolumeVerdict};

/// Run every check over already-loaded inputs; returns rows per entity.
///
/// `history` holds prior runs' processed counts, oldest first.
pub fn check(
    state: &CurrentState,
    processed: u64,
    history: &[u64],
    cfg: &QualityConfig,
) -> Result<RowCounts, QualityError> {
    if let Err(violation) = check_integrity(state, cfg) {
        warn!(%violation, "integrity check failed");
        return Err(violation.into());
    }

    match check_volume(processed, history, cfg) {
        Ok(VolumeVerdict::SkippedNoEvents) => {
            info!("volume check skipped: no events processed")
        }
        Ok(VolumeVerdict::SkippedInsufficientHistory { samples, required }) => {
            info!(samples, required, "volume check skipped: insufficient history")
        }
        Ok(VolumeVerdict::WithinBand { processed, band }) => info!(
            processed,
            lower = band.lower,
            upper = band.upper,
            samples = band.samples,
            "volume within band"
        ),
        Err(anomaly) => {
            warn!(%anomaly, "volume check failed");
            return Err(anomaly.into());
        }
    }

    Ok(state.row_counts())
}

/// Gate bound to a policy; reads state and history through the store seams.
#[derive(Clone, Debug, Default)]
pub struct QualityGate {
    config: QualityConfig,
}

impl QualityGate {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn run<S: StateStore, H: MetricsHistory>(
        &self,
        store: &S,
        history: &H,
        processed: u64,
    ) -> Result<RowCounts, QualityError> {
        let state = load_state(store)?;
        let counts = history.recent_processed_counts(self.config.history_window)?;
        check(&state, processed, &counts, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdc_schemas::{Entity, EntityRecord, OrderRecord, ProductRecord, StateRow, UserRecord};
    use cdc_store::{MemoryMetricsHistory, MemoryStore};
    use chrono::NaiveDate;

    fn populated_store() -> MemoryStore {
        let mut state = CurrentState::default();
        state.users.insert("U1".into(), StateRow::keyed("U1"));
        state.products.insert("P1".into(), StateRow::keyed("P1"));
        let mut order = OrderRecord::keyed("O1");
        order.user_id = Some("U1".into());
        state.orders.insert("O1".into(), StateRow::fresh(order, false));

        let mut store = MemoryStore::new();
        store.save_table::<UserRecord>(&state.users).unwrap();
        store.save_table::<ProductRecord>(&state.products).unwrap();
        store.save_table::<OrderRecord>(&state.orders).unwrap();
        store
    }

    fn history(counts: &[u64]) -> MemoryMetricsHistory {
        let day = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        MemoryMetricsHistory::with_processed_counts(day, counts)
    }

    #[test]
    fn passing_run_returns_row_counts() {
        let gate = QualityGate::default();
        let counts = gate
            .run(&populated_store(), &history(&[100, 100, 100]), 120)
            .unwrap();
        assert_eq!(counts[&Entity::Users], 1);
        assert_eq!(counts[&Entity::OrderItems], 0);
    }

    #[test]
    fn integrity_is_checked_before_volume() {
        let gate = QualityGate::default();
        let err = gate
            .run(&MemoryStore::new(), &history(&[100, 100, 100]), 10_000)
            .unwrap_err();
        assert_eq!(err.class(), "IntegrityError");
    }

    #[test]
    fn anomaly_fails_the_gate() {
        let gate = QualityGate::default();
        let err = gate
            .run(&populated_store(), &history(&[100, 100, 100, 100, 100]), 400)
            .unwrap_err();
        assert!(matches!(err, QualityError::Anomaly(a) if a.processed == 400));
        assert!(err.to_string().contains("count=400"));
    }

    #[test]
    fn window_is_taken_from_config() {
        let gate = QualityGate::new(QualityConfig {
            history_window: 3,
            ..QualityConfig::default()
        });
        // Last three runs average 10, so 100 is out of band.
        let h = history(&[100, 100, 100, 10, 10, 10]);
        assert!(gate.run(&populated_store(), &h, 100).is_err());
        assert!(QualityGate::default().run(&populated_store(), &h, 100).is_ok());
    }
}
