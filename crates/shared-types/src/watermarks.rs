//! # Commitment Watermarks
//!
//! Per-source and aggregate progress markers. Per source the invariant is
//! `processed >= confirmed >= finalized`; the aggregate is the minimum over
//! currently-healthy sources.

use crate::entities::{Slot, SourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Progress markers reported by one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceWatermark {
    /// Highest processed slot.
    pub processed_slot: Slot,
    /// Highest confirmed slot.
    pub confirmed_slot: Slot,
    /// Highest finalized slot.
    pub finalized_slot: Slot,
}

impl SourceWatermark {
    /// Check the per-source commitment invariant.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.processed_slot >= self.confirmed_slot && self.confirmed_slot >= self.finalized_slot
    }

    /// Whether advancing to `next` would move any marker backwards.
    #[must_use]
    pub fn regresses_to(&self, next: &SourceWatermark) -> bool {
        next.processed_slot < self.processed_slot
            || next.confirmed_slot < self.confirmed_slot
            || next.finalized_slot < self.finalized_slot
    }
}

/// A point-in-time view of all watermark state.
///
/// Produced by the watermark tracker's `snapshot()`; consumed by fork
/// resolution (confirmation decisions) and the query boundary
/// (commitment-aware reads).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitmentWatermarks {
    /// Per-source markers, keyed by source.
    pub sources: BTreeMap<SourceId, SourceWatermark>,
    /// Minimum over healthy sources. Zero if no source is healthy.
    pub aggregate: SourceWatermark,
}

impl CommitmentWatermarks {
    /// The aggregate confirmed slot (the fork resolver's trigger line).
    #[must_use]
    pub fn confirmed_slot(&self) -> Slot {
        self.aggregate.confirmed_slot
    }

    /// The aggregate finalized slot (the pruning line).
    #[must_use]
    pub fn finalized_slot(&self) -> Slot {
        self.aggregate.finalized_slot
    }
}
