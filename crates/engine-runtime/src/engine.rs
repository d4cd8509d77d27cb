//! Engine wiring.
//!
//! Builds the full pipeline out of the subsystem crates and exposes the
//! ingest boundary, the subscription boundary, and the query boundary.

use crate::config::EngineConfig;
use crate::gateway::LogGateway;
use crate::source::{IngestSource, SourceEvent};
use acp_01_normalization::{DedupConfig, NormalizeOutcome, Normalizer};
use acp_02_fork_resolution::{
    ForkResolutionApi, ForkResolutionConfig, ForkResolutionService, IngestOutcome,
    ReconcileSummary,
};
use acp_03_watermarks::{WatermarkConfig, WatermarkTracker};
use acp_04_commit_log::{CommitLog, CommitLogConfig, InMemoryTransport};
use acp_05_sink_apply::{
    InMemoryStateStore, RetryPolicy, Sink, SinkApplyConfig, SinkApplyCoordinator, SinkHealth,
};
use acp_06_fanout::{
    EventFilter, FanoutConfig, SubscribeError, Subscription, SubscriptionManager,
};
use acp_telemetry::metrics::{
    NORMALIZER_ACCEPTED, NORMALIZER_DUPLICATES, NORMALIZER_REJECTED, RESOLVER_BLOCKS_CANONICAL,
    RESOLVER_RECORDS_DROPPED, WATERMARK_CONFIRMED, WATERMARK_FINALIZED,
};
use anyhow::Result;
use shared_types::{
    partition_for, CommitmentWatermarks, RawAccountUpdate, ResumeToken, SlotStatusUpdate,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// What happened to one raw update at the ingest boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineIngest {
    /// Committed straight through (its block was already canonical).
    Committed,
    /// Buffered pending fork resolution.
    Buffered,
    /// Dropped (its block is abandoned).
    Dropped,
    /// Suppressed as a duplicate of a recent update.
    Duplicate,
    /// Rejected as malformed; counted, never fatal.
    Rejected,
}

type Resolver = ForkResolutionService<LogGateway<InMemoryTransport>>;

/// The assembled propagation engine.
///
/// One ingest task per upstream source feeds `ingest_update` and
/// `ingest_slot_status`; everything downstream of those two calls is
/// wired internally.
pub struct Engine {
    normalizer: Normalizer,
    resolvers: Vec<Arc<Resolver>>,
    watermarks: Arc<WatermarkTracker>,
    commit_log: Arc<CommitLog<InMemoryTransport>>,
    sinks: Arc<SinkApplyCoordinator>,
    fanout: Arc<SubscriptionManager>,
    state_store: Arc<InMemoryStateStore>,
}

impl Engine {
    /// Wire the pipeline per `config` with the in-memory transport and
    /// the reference state-store sink registered.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let watermarks = Arc::new(WatermarkTracker::new(WatermarkConfig {
            liveness_timeout: config.liveness_timeout(),
        }));
        let commit_log = Arc::new(CommitLog::new(
            CommitLogConfig {
                partitions: config.partitions,
                replay_window: config.replay_window,
                ..CommitLogConfig::default()
            },
            Arc::new(InMemoryTransport::new()),
        ));
        let sinks = Arc::new(SinkApplyCoordinator::new(SinkApplyConfig {
            queue_capacity: config.sink_queue_capacity,
            retry: RetryPolicy {
                initial_delay: Duration::from_millis(config.retry.initial_delay_ms),
                max_delay: Duration::from_millis(config.retry.max_delay_ms),
                multiplier: config.retry.multiplier,
            },
            drain_timeout: config.drain_timeout(),
        }));
        let fanout = Arc::new(SubscriptionManager::new(
            FanoutConfig {
                queue_capacity: config.subscriber_queue_capacity,
                overflow_grace: config.overflow_grace(),
                ..FanoutConfig::default()
            },
            commit_log.clone(),
        ));

        let state_store = Arc::new(InMemoryStateStore::new());
        sinks.register_sink(state_store.clone() as Arc<dyn Sink>)?;

        let gateway = Arc::new(LogGateway::new(
            commit_log.clone(),
            sinks.clone(),
            fanout.clone(),
        ));
        let resolvers = (0..config.resolver_shards.max(1))
            .map(|_| {
                Arc::new(ForkResolutionService::new(
                    ForkResolutionConfig {
                        reorg_buffer_depth: config.reorg_buffer_depth,
                    },
                    gateway.clone(),
                    watermarks.clone(),
                ))
            })
            .collect();

        info!(
            resolver_shards = config.resolver_shards,
            partitions = config.partitions,
            "Engine wired"
        );
        Ok(Self {
            normalizer: Normalizer::new(DedupConfig {
                window_size: config.dedup_window,
                shards: config.dedup_shards,
            }),
            resolvers,
            watermarks,
            commit_log,
            sinks,
            fanout,
            state_store,
        })
    }

    /// Spawn the ingest task for one upstream source.
    ///
    /// The task drains the feed into `ingest_update` and
    /// `ingest_slot_status` and exits when the feed ends. Per-event
    /// failures are logged and skipped; the task itself never aborts
    /// the pipeline.
    pub fn attach_source<S>(self: &Arc<Self>, mut source: S) -> JoinHandle<()>
    where
        S: IngestSource,
    {
        let engine = Arc::clone(self);
        let source_id = source.source_id();
        tokio::spawn(async move {
            info!(source = source_id, "Ingest task started");
            while let Some(event) = source.next_event().await {
                let result = match event {
                    SourceEvent::Update(raw) => engine.ingest_update(raw).await.map(|_| ()),
                    SourceEvent::SlotStatus(status) => {
                        engine.ingest_slot_status(status).await.map(|_| ())
                    }
                };
                if let Err(err) = result {
                    warn!(source = source_id, %err, "Ingest failed; event skipped");
                }
            }
            info!(source = source_id, "Ingest task finished");
        })
    }

    /// Feed one raw update through normalization and fork resolution.
    /// Malformed input is absorbed here: counted and reported, never an
    /// error to the caller.
    pub async fn ingest_update(&self, raw: RawAccountUpdate) -> Result<EngineIngest> {
        let record = match self.normalizer.normalize(raw) {
            Ok(NormalizeOutcome::Record(record)) => record,
            Ok(NormalizeOutcome::Duplicate) => {
                NORMALIZER_DUPLICATES.inc();
                return Ok(EngineIngest::Duplicate);
            }
            Err(err) => {
                NORMALIZER_REJECTED.inc();
                warn!(%err, "Malformed update rejected");
                return Ok(EngineIngest::Rejected);
            }
        };
        NORMALIZER_ACCEPTED.inc();

        let shard = partition_for(&record.pubkey, self.resolvers.len() as u32) as usize;
        let outcome = self.resolvers[shard].ingest(record).await?;
        if outcome == IngestOutcome::Dropped {
            RESOLVER_RECORDS_DROPPED.inc();
        }
        Ok(match outcome {
            IngestOutcome::Committed => EngineIngest::Committed,
            IngestOutcome::Buffered => EngineIngest::Buffered,
            IngestOutcome::Dropped => EngineIngest::Dropped,
        })
    }

    /// Feed a per-source watermark report to every resolver shard,
    /// raise the normalizer's finalized floor, and refresh the
    /// watermark gauges. Summaries are merged across shards.
    pub async fn ingest_slot_status(&self, update: SlotStatusUpdate) -> Result<ReconcileSummary> {
        let mut merged = ReconcileSummary::default();
        for resolver in &self.resolvers {
            let summary = resolver.on_slot_status(update.clone()).await?;
            merged.blocks_canonicalized += summary.blocks_canonicalized;
            merged.blocks_abandoned += summary.blocks_abandoned;
            merged.records_committed += summary.records_committed;
            merged.records_dropped += summary.records_dropped;
            merged.tombstones_emitted += summary.tombstones_emitted;
            merged.reorg_detected |= summary.reorg_detected;
        }
        RESOLVER_BLOCKS_CANONICAL.inc_by(merged.blocks_canonicalized as f64);

        let snapshot = self.watermarks.snapshot();
        self.normalizer.raise_floor(snapshot.finalized_slot());
        WATERMARK_CONFIRMED.set(snapshot.confirmed_slot() as f64);
        WATERMARK_FINALIZED.set(snapshot.finalized_slot() as f64);
        Ok(merged)
    }

    /// Open a subscription, optionally resuming from a token.
    pub fn subscribe(
        &self,
        filter: EventFilter,
        resume: Option<ResumeToken>,
    ) -> Result<Subscription, SubscribeError> {
        self.fanout.subscribe(filter, resume)
    }

    /// Record subscriber progress.
    pub fn ack(&self, subscription: uuid::Uuid, sequence: u64) {
        if let Err(err) = self.fanout.ack(subscription, sequence) {
            warn!(%err, "Ack for unknown subscription");
        }
    }

    /// Commitment-aware progress snapshot for the serving layer.
    #[must_use]
    pub fn watermark(&self) -> CommitmentWatermarks {
        self.watermarks.snapshot()
    }

    /// Health of every registered sink.
    #[must_use]
    pub fn sink_health(&self) -> Vec<SinkHealth> {
        self.sinks.health()
    }

    /// The reference in-memory state store.
    #[must_use]
    pub fn state_store(&self) -> &Arc<InMemoryStateStore> {
        &self.state_store
    }

    /// The commit log, for external replay consumers.
    #[must_use]
    pub fn commit_log(&self) -> &Arc<CommitLog<InMemoryTransport>> {
        &self.commit_log
    }

    /// Stop intake and drain sink pipelines within the bounded timeout.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Engine shutting down");
        self.sinks.shutdown().await?;
        info!("Engine shutdown complete");
        Ok(())
    }
}
