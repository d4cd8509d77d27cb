//! Error types for the Watermark Tracker

use shared_types::{Slot, SourceId};
use thiserror::Error;

/// Watermark tracking errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WatermarkError {
    /// A source reported markers violating `processed >= confirmed >= finalized`.
    #[error("Inconsistent watermark from source {source_id}: processed={processed} confirmed={confirmed} finalized={finalized}")]
    InconsistentReport {
        source_id: SourceId,
        processed: Slot,
        confirmed: Slot,
        finalized: Slot,
    },
}

/// Result type for watermark operations.
pub type WatermarkResult<T> = Result<T, WatermarkError>;
