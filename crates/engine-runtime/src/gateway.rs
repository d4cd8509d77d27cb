//! Canonical gateway wiring.
//!
//! Bridges the Fork Resolver's output into the Commit Log and from
//! there into the sink pipelines and the fan-out manager.

use acp_02_fork_resolution::{CanonicalGateway, ForkResolutionError, ForkResolutionResult, ReorgEvent};
use acp_04_commit_log::{CommitLog, CommitLogError, LogTransport};
use acp_05_sink_apply::SinkApplyCoordinator;
use acp_06_fanout::SubscriptionManager;
use acp_telemetry::metrics::{COMMITS_TOTAL, RESOLVER_REORGS, TOMBSTONES_TOTAL};
use async_trait::async_trait;
use shared_types::{BankHash, ChangeRecord, IdempotencyKey, Slot};
use std::sync::Arc;

/// Drives each canonical emission through sequencing, sink apply
/// dispatch, and subscriber fan-out, in that order.
pub struct LogGateway<T>
where
    T: LogTransport,
{
    log: Arc<CommitLog<T>>,
    sinks: Arc<SinkApplyCoordinator>,
    fanout: Arc<SubscriptionManager>,
}

impl<T> LogGateway<T>
where
    T: LogTransport,
{
    pub fn new(
        log: Arc<CommitLog<T>>,
        sinks: Arc<SinkApplyCoordinator>,
        fanout: Arc<SubscriptionManager>,
    ) -> Self {
        Self { log, sinks, fanout }
    }
}

fn gateway_failed(slot: Slot, err: CommitLogError) -> ForkResolutionError {
    ForkResolutionError::GatewayFailed {
        slot,
        reason: err.to_string(),
    }
}

#[async_trait]
impl<T> CanonicalGateway for LogGateway<T>
where
    T: LogTransport,
{
    async fn commit(&self, record: ChangeRecord) -> ForkResolutionResult<()> {
        let slot = record.slot;
        let sequenced = self
            .log
            .commit(record)
            .await
            .map_err(|e| gateway_failed(slot, e))?;
        COMMITS_TOTAL.inc();
        self.sinks.dispatch(&sequenced).await;
        self.fanout.publish(&sequenced);
        Ok(())
    }

    async fn tombstone(
        &self,
        key: IdempotencyKey,
        new_branch: BankHash,
    ) -> ForkResolutionResult<()> {
        let slot = key.slot;
        let sequenced = self
            .log
            .tombstone(key, new_branch)
            .await
            .map_err(|e| gateway_failed(slot, e))?;
        TOMBSTONES_TOTAL.inc();
        self.sinks.dispatch(&sequenced).await;
        self.fanout.publish(&sequenced);
        Ok(())
    }

    async fn reorg(&self, event: ReorgEvent) -> ForkResolutionResult<()> {
        RESOLVER_REORGS.inc();
        self.log.mark_rolled_back(event.divergence_slot);
        self.fanout.on_reorg(event.divergence_slot);
        Ok(())
    }
}
