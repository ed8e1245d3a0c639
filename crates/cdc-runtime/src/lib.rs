//! cdc-runtime
//!
//! One run = merge → quality gate → run-metrics record. A run that merged
//! but failed the gate ends in [`RunError::GateFailedAfterMerge`]: state is
//! already persisted and no metrics record is written, so the next run's
//! history does not include the suspect volume.

mod error;
mod pipeline;

pub use error::RunError;
pub use pipeline::{bronze_source, open_file_pipeline, Pipeline};
