//! Watermark tracker implementation

use crate::error::{WatermarkError, WatermarkResult};
use parking_lot::RwLock;
use shared_types::{CommitmentWatermarks, Slot, SourceId, SourceWatermark};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Configuration for watermark tracking.
#[derive(Debug, Clone, Copy)]
pub struct WatermarkConfig {
    /// How long a source may stay silent before it is excluded from the
    /// aggregate.
    pub liveness_timeout: Duration,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            liveness_timeout: Duration::from_secs(30),
        }
    }
}

struct SourceEntry {
    watermark: SourceWatermark,
    last_report: Instant,
}

struct TrackerState {
    sources: BTreeMap<SourceId, SourceEntry>,
    /// Last published aggregate. Markers never move backwards, even when
    /// the healthy set shrinks or a slow source joins.
    aggregate: SourceWatermark,
}

/// Process-wide commitment progress state.
///
/// Written by exactly one component (fork resolution), read everywhere
/// via snapshots or the watch channel.
pub struct WatermarkTracker {
    state: RwLock<TrackerState>,
    config: WatermarkConfig,
    tx: watch::Sender<CommitmentWatermarks>,
}

impl WatermarkTracker {
    /// Create a tracker with the given liveness policy.
    #[must_use]
    pub fn new(config: WatermarkConfig) -> Self {
        let (tx, _) = watch::channel(CommitmentWatermarks::default());
        Self {
            state: RwLock::new(TrackerState {
                sources: BTreeMap::new(),
                aggregate: SourceWatermark::default(),
            }),
            config,
            tx,
        }
    }

    /// Record a watermark report from one source and republish the
    /// aggregate.
    ///
    /// Markers are clamped to be non-decreasing per source: a regressing
    /// report is logged and clamped rather than applied, so downstream
    /// consumers never observe progress moving backwards.
    ///
    /// # Errors
    ///
    /// [`WatermarkError::InconsistentReport`] if the report violates
    /// `processed >= confirmed >= finalized`.
    pub fn advance(
        &self,
        source_id: SourceId,
        processed: Slot,
        confirmed: Slot,
        finalized: Slot,
    ) -> WatermarkResult<()> {
        let report = SourceWatermark {
            processed_slot: processed,
            confirmed_slot: confirmed,
            finalized_slot: finalized,
        };
        if !report.is_consistent() {
            return Err(WatermarkError::InconsistentReport {
                source_id,
                processed,
                confirmed,
                finalized,
            });
        }

        let snapshot = {
            let mut state = self.state.write();
            let now = Instant::now();
            let entry = state.sources.entry(source_id).or_insert(SourceEntry {
                watermark: SourceWatermark::default(),
                last_report: now,
            });

            if entry.watermark.regresses_to(&report) {
                warn!(
                    source = source_id,
                    "Watermark report regressed; clamping to previous markers"
                );
            }
            entry.watermark = SourceWatermark {
                processed_slot: entry.watermark.processed_slot.max(report.processed_slot),
                confirmed_slot: entry.watermark.confirmed_slot.max(report.confirmed_slot),
                finalized_slot: entry.watermark.finalized_slot.max(report.finalized_slot),
            };
            entry.last_report = now;

            Self::recompute(&mut state, now, self.config.liveness_timeout)
        };

        debug!(
            source = source_id,
            confirmed = snapshot.aggregate.confirmed_slot,
            finalized = snapshot.aggregate.finalized_slot,
            "Watermark advanced"
        );
        // Receivers may come and go; a send with no receivers is fine.
        let _ = self.tx.send(snapshot);
        Ok(())
    }

    /// Point-in-time view of all watermark state.
    #[must_use]
    pub fn snapshot(&self) -> CommitmentWatermarks {
        let state = self.state.read();
        CommitmentWatermarks {
            sources: state
                .sources
                .iter()
                .map(|(id, e)| (*id, e.watermark))
                .collect(),
            aggregate: state.aggregate,
        }
    }

    /// Subscribe to aggregate changes (non-blocking poll/notify).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CommitmentWatermarks> {
        self.tx.subscribe()
    }

    /// Sources that reported within the liveness timeout.
    #[must_use]
    pub fn healthy_sources(&self) -> Vec<SourceId> {
        let state = self.state.read();
        let now = Instant::now();
        state
            .sources
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_report) <= self.config.liveness_timeout)
            .map(|(id, _)| *id)
            .collect()
    }

    fn recompute(
        state: &mut TrackerState,
        now: Instant,
        liveness_timeout: Duration,
    ) -> CommitmentWatermarks {
        let healthy: Vec<&SourceWatermark> = state
            .sources
            .values()
            .filter(|e| now.duration_since(e.last_report) <= liveness_timeout)
            .map(|e| &e.watermark)
            .collect();

        if !healthy.is_empty() {
            let candidate = SourceWatermark {
                processed_slot: healthy.iter().map(|w| w.processed_slot).min().unwrap_or(0),
                confirmed_slot: healthy.iter().map(|w| w.confirmed_slot).min().unwrap_or(0),
                finalized_slot: healthy.iter().map(|w| w.finalized_slot).min().unwrap_or(0),
            };
            // The aggregate never regresses: a freshly-joined slow source
            // lowers the min but must not unwind published progress.
            state.aggregate = SourceWatermark {
                processed_slot: state.aggregate.processed_slot.max(candidate.processed_slot),
                confirmed_slot: state.aggregate.confirmed_slot.max(candidate.confirmed_slot),
                finalized_slot: state.aggregate.finalized_slot.max(candidate.finalized_slot),
            };
        }

        CommitmentWatermarks {
            sources: state
                .sources
                .iter()
                .map(|(id, e)| (*id, e.watermark))
                .collect(),
            aggregate: state.aggregate,
        }
    }
}

impl Default for WatermarkTracker {
    fn default() -> Self {
        Self::new(WatermarkConfig::default())
    }
}
