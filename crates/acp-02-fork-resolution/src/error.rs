//! Error types for the Fork Resolver

use acp_03_watermarks::WatermarkError;
use shared_types::Slot;
use thiserror::Error;

/// Fork-resolution errors.
#[derive(Debug, Error)]
pub enum ForkResolutionError {
    /// A watermark report was rejected by the tracker.
    #[error("Watermark rejected: {0}")]
    Watermark(#[from] WatermarkError),

    /// The downstream commit gateway failed mid-emission. Lineage state
    /// has already advanced; the caller surfaces the error and the
    /// runtime restarts the pipeline from the commit log.
    #[error("Canonical gateway failed at slot {slot}: {reason}")]
    GatewayFailed { slot: Slot, reason: String },
}

/// Result type for fork-resolution operations.
pub type ForkResolutionResult<T> = Result<T, ForkResolutionError>;
