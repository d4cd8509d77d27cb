//! Fan-out Manager - Core business logic

use crate::domain::filter::EventFilter;
use crate::error::{FanoutError, FanoutResult, SubscribeError};
use crate::ports::outbound::ReplaySource;
use acp_telemetry::metrics::{FANOUT_DELIVERED, FANOUT_OVERFLOWS, FANOUT_SUBSCRIBERS};
use parking_lot::Mutex;
use shared_types::{
    BankHash, CommitmentLevel, PartitionId, ResumeToken, SequencedRecord, Slot,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fan-out configuration.
#[derive(Clone, Copy, Debug)]
pub struct FanoutConfig {
    /// Bounded queue depth per subscriber.
    pub queue_capacity: usize,
    /// How long a subscriber may stay overflowed before termination.
    pub overflow_grace: Duration,
    /// Commitment level stamped into issued resume tokens.
    pub commitment: CommitmentLevel,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            overflow_grace: Duration::from_secs(5),
            commitment: CommitmentLevel::Confirmed,
        }
    }
}

/// What a subscriber receives on its queue.
#[derive(Debug, Clone)]
pub enum FanoutEvent {
    /// A canonical record matching the subscription's filter.
    Record(SequencedRecord),
    /// A fork rollback happened; deliveries continue, but consumers
    /// holding external state derived from the old branch should expect
    /// tombstones next.
    Resync { divergence_slot: Slot },
}

/// Position of the last record queued to a subscriber.
#[derive(Debug, Clone, Copy)]
struct QueuedPos {
    partition: PartitionId,
    sequence_number: u64,
    checkpoint_hash: BankHash,
    slot: Slot,
    write_version: u64,
}

struct SubEntry {
    filter: EventFilter,
    tx: mpsc::Sender<FanoutEvent>,
    termination: Arc<Mutex<Option<ResumeToken>>>,
    last_queued: Option<QueuedPos>,
    last_acked: Option<u64>,
    overflow_since: Option<Instant>,
}

/// A live subscription handle.
///
/// Dropping it unsubscribes implicitly: the manager notices the closed
/// queue on the next publish and cleans up.
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<FanoutEvent>,
    termination: Arc<Mutex<Option<ResumeToken>>>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, or `None` once the manager closed the queue. Events
    /// queued before an overflow termination are still delivered.
    pub async fn recv(&mut self) -> Option<FanoutEvent> {
        self.rx.recv().await
    }

    /// The resume token issued when the manager terminated this
    /// subscription, if it did. Read it after `recv` returns `None`.
    #[must_use]
    pub fn termination_token(&self) -> Option<ResumeToken> {
        *self.termination.lock()
    }

    /// The event queue as a `Stream`. The termination token stays
    /// readable through a handle taken before conversion.
    pub fn into_stream(self) -> ReceiverStream<FanoutEvent> {
        ReceiverStream::new(self.rx)
    }
}

/// Subscription Fan-out & Resume Manager.
pub struct SubscriptionManager {
    config: FanoutConfig,
    log: Arc<dyn ReplaySource>,
    subs: Mutex<HashMap<Uuid, SubEntry>>,
    overflow_events: AtomicU64,
}

impl SubscriptionManager {
    pub fn new(config: FanoutConfig, log: Arc<dyn ReplaySource>) -> Self {
        Self {
            config,
            log,
            subs: Mutex::new(HashMap::new()),
            overflow_events: AtomicU64::new(0),
        }
    }

    /// Open a subscription, optionally resuming from a token.
    ///
    /// A valid token replays the missed span before live delivery
    /// starts: the token's partition strictly after its sequence, the
    /// remaining partitions from their retained windows. Delivery is
    /// at-least-once; consumers de-duplicate by IdempotencyKey.
    pub fn subscribe(
        &self,
        filter: EventFilter,
        resume: Option<ResumeToken>,
    ) -> Result<Subscription, SubscribeError> {
        let mut backlog = Vec::new();
        if let Some(token) = &resume {
            let validated = self.log.replay_from(
                token.partition,
                token.sequence_number,
                &token.checkpoint_hash,
            )?;
            for partition in 0..self.log.partition_count() {
                if partition == token.partition {
                    backlog.extend(validated.iter().cloned());
                } else {
                    backlog.extend(self.log.retained(partition));
                }
            }
            backlog.retain(|r| filter.matches(r));
        }

        let id = Uuid::new_v4();
        // The initial capacity absorbs the whole replayed span so the
        // backlog can be queued without blocking.
        let capacity = self.config.queue_capacity + backlog.len();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let termination = Arc::new(Mutex::new(None));

        let mut entry = SubEntry {
            filter,
            tx,
            termination: termination.clone(),
            last_queued: None,
            last_acked: None,
            overflow_since: None,
        };
        let replayed = backlog.len();
        for record in backlog {
            let pos = queued_pos(&record);
            if entry.tx.try_send(FanoutEvent::Record(record)).is_ok() {
                entry.last_queued = Some(pos);
            }
        }
        let live = {
            let mut subs = self.subs.lock();
            subs.insert(id, entry);
            subs.len()
        };
        FANOUT_SUBSCRIBERS.set(live as f64);

        info!(
            subscription = %id,
            resumed = resume.is_some(),
            replayed,
            "Subscription opened"
        );
        Ok(Subscription {
            id,
            rx,
            termination,
        })
    }

    /// Fan one committed record out to every matching subscriber.
    ///
    /// A full queue skips the record for that subscriber, which makes
    /// the subscription unrecoverable: its resume token must point at
    /// the last queued sequence, so nothing published after the skip
    /// may be queued either. The grace period only defers the close so
    /// an actively draining consumer empties its queue first; once it
    /// expires, the subscription is terminated with the token.
    pub fn publish(&self, record: &SequencedRecord) {
        let now = Instant::now();
        let mut doomed = Vec::new();
        {
            let mut subs = self.subs.lock();
            for (id, entry) in subs.iter_mut() {
                if !entry.filter.matches(record) {
                    continue;
                }
                if let Some(since) = entry.overflow_since {
                    // A record was already skipped; queueing this one
                    // would hide the gap behind the resume token.
                    if now.duration_since(since) >= self.config.overflow_grace {
                        doomed.push(*id);
                    }
                    continue;
                }
                match entry.tx.try_send(FanoutEvent::Record(record.clone())) {
                    Ok(()) => {
                        entry.last_queued = Some(queued_pos(record));
                        FANOUT_DELIVERED.inc();
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.overflow_events.fetch_add(1, Ordering::Relaxed);
                        FANOUT_OVERFLOWS.inc();
                        entry.overflow_since = Some(now);
                        if self.config.overflow_grace.is_zero() {
                            doomed.push(*id);
                        } else {
                            warn!(
                                subscription = %id,
                                sequence = record.sequence_number,
                                "Subscriber queue full; terminating after grace"
                            );
                        }
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        doomed.push(*id);
                    }
                }
            }
            for id in &doomed {
                if let Some(entry) = subs.remove(id) {
                    let token = entry
                        .last_queued
                        .map(|pos| self.mint_token(*id, pos));
                    *entry.termination.lock() = token;
                    info!(
                        subscription = %id,
                        token = token.is_some(),
                        "Subscription terminated"
                    );
                }
            }
            if !doomed.is_empty() {
                FANOUT_SUBSCRIBERS.set(subs.len() as f64);
            }
        }
    }

    /// Record consumer progress. Feeds health reporting; the overflow
    /// termination token itself points at the last queued sequence, so
    /// nothing already handed to the queue is lost.
    pub fn ack(&self, subscription_id: Uuid, sequence: u64) -> FanoutResult<()> {
        let mut subs = self.subs.lock();
        let entry = subs
            .get_mut(&subscription_id)
            .ok_or(FanoutError::UnknownSubscription(subscription_id))?;
        entry.last_acked = Some(entry.last_acked.map_or(sequence, |a| a.max(sequence)));
        debug!(subscription = %subscription_id, sequence, "Acked");
        Ok(())
    }

    /// Highest sequence a subscriber has acknowledged.
    #[must_use]
    pub fn acked(&self, subscription_id: Uuid) -> Option<u64> {
        self.subs
            .lock()
            .get(&subscription_id)
            .and_then(|e| e.last_acked)
    }

    /// Close a subscription explicitly. In-flight queued events are
    /// still drainable by the holder of the `Subscription`.
    pub fn unsubscribe(&self, subscription_id: Uuid) {
        let mut subs = self.subs.lock();
        if subs.remove(&subscription_id).is_some() {
            FANOUT_SUBSCRIBERS.set(subs.len() as f64);
            info!(subscription = %subscription_id, "Unsubscribed");
        }
    }

    /// Tell every subscriber a rollback happened. Best effort; a
    /// subscriber too backed up to hear it will find out through its
    /// stale token instead.
    pub fn on_reorg(&self, divergence_slot: Slot) {
        let subs = self.subs.lock();
        for entry in subs.values() {
            let _ = entry.tx.try_send(FanoutEvent::Resync { divergence_slot });
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subs.lock().len()
    }

    /// Total queue-full observations across all subscribers.
    #[must_use]
    pub fn overflow_events(&self) -> u64 {
        self.overflow_events.load(Ordering::Relaxed)
    }

    fn mint_token(&self, subscription_id: Uuid, pos: QueuedPos) -> ResumeToken {
        ResumeToken {
            slot: pos.slot,
            write_version: pos.write_version,
            commitment_level: self.config.commitment,
            sequence_number: pos.sequence_number,
            partition: pos.partition,
            checkpoint_hash: pos.checkpoint_hash,
            subscription_id,
        }
    }
}

fn queued_pos(record: &SequencedRecord) -> QueuedPos {
    let key = record.idempotency_key();
    QueuedPos {
        partition: record.partition,
        sequence_number: record.sequence_number,
        checkpoint_hash: record.checkpoint_hash,
        slot: key.slot,
        write_version: key.write_version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acp_04_commit_log::{CommitLog, CommitLogConfig, InMemoryTransport};
    use shared_types::{ChangeRecord, RecordPayload, ResumeInvalid};

    fn change(slot: Slot, wv: u64, pubkey: [u8; 32], owner: [u8; 32]) -> ChangeRecord {
        ChangeRecord {
            slot,
            write_version: wv,
            transaction_index: 0,
            pubkey,
            owner,
            lamports: slot,
            data: Vec::new(),
            data_hash: [0u8; 32],
            rent_epoch: 0,
            source_id: 1,
            bank_hash: [slot as u8; 32],
            parent_bank_hash: [0u8; 32],
        }
    }

    fn sequenced(seq: u64, slot: Slot, pubkey: [u8; 32]) -> SequencedRecord {
        SequencedRecord {
            sequence_number: seq,
            partition: 0,
            checkpoint_hash: [slot as u8; 32],
            payload: RecordPayload::Write(change(slot, seq + 1, pubkey, [0xAAu8; 32])),
        }
    }

    fn manager(config: FanoutConfig) -> (SubscriptionManager, Arc<CommitLog<InMemoryTransport>>) {
        let log = Arc::new(CommitLog::new(
            CommitLogConfig {
                partitions: 4,
                replay_window: 8,
                tail_capacity: 64,
            },
            Arc::new(InMemoryTransport::new()),
        ));
        (SubscriptionManager::new(config, log.clone()), log)
    }

    #[tokio::test]
    async fn test_live_delivery_respects_filter() {
        let (manager, _) = manager(FanoutConfig::default());
        let mut sub = manager
            .subscribe(EventFilter::for_accounts([[1u8; 32]]), None)
            .unwrap();

        manager.publish(&sequenced(0, 10, [1u8; 32]));
        manager.publish(&sequenced(1, 10, [9u8; 32]));
        manager.publish(&sequenced(2, 11, [1u8; 32]));

        let FanoutEvent::Record(first) = sub.recv().await.unwrap() else {
            panic!("expected record");
        };
        assert_eq!(first.sequence_number, 0);
        let FanoutEvent::Record(second) = sub.recv().await.unwrap() else {
            panic!("expected record");
        };
        assert_eq!(second.sequence_number, 2);
    }

    #[tokio::test]
    async fn test_ack_tracks_progress() {
        let (manager, _) = manager(FanoutConfig::default());
        let sub = manager.subscribe(EventFilter::all(), None).unwrap();
        manager.ack(sub.id(), 5).unwrap();
        manager.ack(sub.id(), 3).unwrap();
        assert_eq!(manager.acked(sub.id()), Some(5));
        assert!(manager.ack(Uuid::new_v4(), 1).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_terminates_with_token_after_grace() {
        let config = FanoutConfig {
            queue_capacity: 2,
            overflow_grace: Duration::from_secs(1),
            ..FanoutConfig::default()
        };
        let (manager, _) = manager(config);
        let mut sub = manager.subscribe(EventFilter::all(), None).unwrap();

        manager.publish(&sequenced(0, 10, [1u8; 32]));
        manager.publish(&sequenced(1, 10, [1u8; 32]));
        // Queue full: overflow clock starts, subscription survives.
        manager.publish(&sequenced(2, 10, [1u8; 32]));
        assert_eq!(manager.subscriber_count(), 1);
        assert!(manager.overflow_events() >= 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        manager.publish(&sequenced(3, 10, [1u8; 32]));
        assert_eq!(manager.subscriber_count(), 0);

        // Already-queued events drain, then the stream ends.
        assert!(matches!(sub.recv().await, Some(FanoutEvent::Record(_))));
        assert!(matches!(sub.recv().await, Some(FanoutEvent::Record(_))));
        assert!(sub.recv().await.is_none());

        let token = sub.termination_token().expect("token issued");
        assert_eq!(token.sequence_number, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_draining_within_grace_does_not_revive_overflowed_subscriber() {
        let config = FanoutConfig {
            queue_capacity: 2,
            overflow_grace: Duration::from_secs(5),
            ..FanoutConfig::default()
        };
        let (manager, _) = manager(config);
        let mut sub = manager.subscribe(EventFilter::all(), None).unwrap();

        manager.publish(&sequenced(0, 10, [1u8; 32]));
        manager.publish(&sequenced(1, 10, [1u8; 32]));
        // Sequence 2 is skipped: the gap is permanent.
        manager.publish(&sequenced(2, 10, [1u8; 32]));
        assert_eq!(manager.subscriber_count(), 1);

        // The consumer frees a queue slot mid-grace; sequence 3 must
        // still not be queued, or the token would hide the gap at 2.
        let FanoutEvent::Record(first) = sub.recv().await.unwrap() else {
            panic!("expected record");
        };
        assert_eq!(first.sequence_number, 0);
        manager.publish(&sequenced(3, 10, [1u8; 32]));

        tokio::time::advance(Duration::from_secs(6)).await;
        manager.publish(&sequenced(4, 10, [1u8; 32]));
        assert_eq!(manager.subscriber_count(), 0);

        let FanoutEvent::Record(second) = sub.recv().await.unwrap() else {
            panic!("expected record");
        };
        assert_eq!(second.sequence_number, 1);
        assert!(sub.recv().await.is_none());

        let token = sub.termination_token().expect("token issued");
        assert_eq!(token.sequence_number, 1);
    }

    #[tokio::test]
    async fn test_delivery_and_overflow_metrics_advance() {
        let config = FanoutConfig {
            queue_capacity: 1,
            overflow_grace: Duration::from_secs(60),
            ..FanoutConfig::default()
        };
        let (manager, _) = manager(config);
        let _sub = manager.subscribe(EventFilter::all(), None).unwrap();
        let delivered_before = FANOUT_DELIVERED.get();
        let overflows_before = FANOUT_OVERFLOWS.get();

        manager.publish(&sequenced(0, 10, [1u8; 32]));
        manager.publish(&sequenced(1, 10, [1u8; 32]));

        // Counters are process-global and monotonic, so deltas are the
        // only safe assertion under parallel tests.
        assert!(FANOUT_DELIVERED.get() >= delivered_before + 1.0);
        assert!(FANOUT_OVERFLOWS.get() >= overflows_before + 1.0);
    }

    #[tokio::test]
    async fn test_resume_replays_missed_span() {
        let (manager, log) = manager(FanoutConfig::default());
        let key = [1u8; 32];
        let first = log.commit(change(10, 1, key, [0xAAu8; 32])).await.unwrap();
        log.commit(change(10, 2, key, [0xAAu8; 32])).await.unwrap();
        log.commit(change(11, 3, key, [0xAAu8; 32])).await.unwrap();

        let token = ResumeToken {
            slot: 10,
            write_version: 1,
            commitment_level: CommitmentLevel::Confirmed,
            sequence_number: first.sequence_number,
            partition: first.partition,
            checkpoint_hash: first.checkpoint_hash,
            subscription_id: Uuid::new_v4(),
        };
        let mut sub = manager.subscribe(EventFilter::all(), Some(token)).unwrap();

        let mut versions = Vec::new();
        for _ in 0..2 {
            let FanoutEvent::Record(record) = sub.recv().await.unwrap() else {
                panic!("expected record");
            };
            versions.push(record.ordering_key().write_version);
        }
        assert_eq!(versions, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_resume_rejected_after_rollback() {
        let (manager, log) = manager(FanoutConfig::default());
        let sr = log.commit(change(50, 1, [1u8; 32], [0xAAu8; 32])).await.unwrap();
        log.mark_rolled_back(50);

        let token = ResumeToken {
            slot: 50,
            write_version: 1,
            commitment_level: CommitmentLevel::Confirmed,
            sequence_number: sr.sequence_number,
            partition: sr.partition,
            checkpoint_hash: sr.checkpoint_hash,
            subscription_id: Uuid::new_v4(),
        };
        let err = manager
            .subscribe(EventFilter::all(), Some(token))
            .err()
            .expect("resume must fail");
        assert!(matches!(
            err,
            SubscribeError::ResumeInvalid(ResumeInvalid::CheckpointMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_resume_rejected_when_aged_out() {
        let (manager, log) = manager(FanoutConfig::default());
        let key = [1u8; 32];
        let first = log.commit(change(10, 1, key, [0xAAu8; 32])).await.unwrap();
        // Window capacity is 8; push the first record out.
        for wv in 2..=12 {
            log.commit(change(10, wv, key, [0xAAu8; 32])).await.unwrap();
        }

        let token = ResumeToken {
            slot: 10,
            write_version: 1,
            commitment_level: CommitmentLevel::Confirmed,
            sequence_number: first.sequence_number,
            partition: first.partition,
            checkpoint_hash: first.checkpoint_hash,
            subscription_id: Uuid::new_v4(),
        };
        let err = manager
            .subscribe(EventFilter::all(), Some(token))
            .err()
            .expect("resume must fail");
        assert!(matches!(
            err,
            SubscribeError::ResumeInvalid(ResumeInvalid::AgedOut { .. })
        ));
    }

    #[tokio::test]
    async fn test_reorg_signal_reaches_subscribers() {
        let (manager, _) = manager(FanoutConfig::default());
        let mut sub = manager.subscribe(EventFilter::all(), None).unwrap();
        manager.on_reorg(50);
        assert!(matches!(
            sub.recv().await,
            Some(FanoutEvent::Resync { divergence_slot: 50 })
        ));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_cleaned_up() {
        let (manager, _) = manager(FanoutConfig::default());
        let sub = manager.subscribe(EventFilter::all(), None).unwrap();
        drop(sub);
        manager.publish(&sequenced(0, 10, [1u8; 32]));
        assert_eq!(manager.subscriber_count(), 0);
    }
}
