//! Slow-subscriber termination and token-based reconnection.

use super::*;
use acp_06_fanout::{EventFilter, FanoutEvent, SubscribeError};
use engine_runtime::EngineConfig;
use shared_types::{IdempotencyKey, ResumeInvalid, ResumeToken};
use std::collections::HashSet;
use uuid::Uuid;

/// One partition keeps the sequence space total; a two-deep queue with
/// zero grace makes overflow termination immediate and deterministic.
fn resume_config() -> EngineConfig {
    EngineConfig {
        resolver_shards: 1,
        partitions: 1,
        replay_window: 64,
        subscriber_queue_capacity: 2,
        overflow_grace_secs: 0,
        ..EngineConfig::default()
    }
}

async fn confirm_block(
    engine: &engine_runtime::Engine,
    slot: u64,
    bank: shared_types::BankHash,
    parent: shared_types::BankHash,
    keys: &[u8],
) {
    for (wv, key) in keys.iter().enumerate() {
        engine
            .ingest_update(raw_update(
                slot,
                wv as u64 + 1,
                pubkey(*key),
                1,
                bank,
                parent,
                1_000 + u64::from(*key),
            ))
            .await
            .unwrap();
    }
    engine.ingest_slot_status(slot_status(1, slot)).await.unwrap();
}

#[tokio::test]
async fn test_overflowed_subscriber_terminated_with_token() {
    let engine = engine_runtime::Engine::new(&resume_config()).unwrap();
    let mut sub = engine.subscribe(EventFilter::all(), None).unwrap();

    confirm_block(&engine, 10, hash(0x10), hash(0x09), &[1, 1]).await;
    // The queue is full now; the next block pushes the subscriber over.
    confirm_block(&engine, 11, hash(0x11), hash(0x10), &[2, 3, 4]).await;

    // Everything queued before the termination still drains.
    let mut drained = Vec::new();
    while let Some(event) = sub.recv().await {
        if let FanoutEvent::Record(record) = event {
            drained.push(record.sequence_number);
        }
    }
    assert_eq!(drained, vec![0, 1]);

    let token = sub.termination_token().expect("token issued");
    assert_eq!(token.partition, 0);
    assert_eq!(token.sequence_number, 1);
    assert_eq!(token.slot, 10);
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_with_token_delivers_missed_span() {
    let engine = engine_runtime::Engine::new(&resume_config()).unwrap();
    let mut sub = engine.subscribe(EventFilter::all(), None).unwrap();

    confirm_block(&engine, 10, hash(0x10), hash(0x09), &[1, 1]).await;
    confirm_block(&engine, 11, hash(0x11), hash(0x10), &[2, 3, 4]).await;
    while sub.recv().await.is_some() {}
    let token = sub.termination_token().expect("token issued");

    // Clients hold the opaque wire form across the disconnect.
    let reissued = ResumeToken::decode(&token.encode()).unwrap();
    let mut sub = engine
        .subscribe(EventFilter::all(), Some(reissued))
        .unwrap();

    let mut sequences = Vec::new();
    let mut keys: HashSet<IdempotencyKey> = HashSet::new();
    for _ in 0..3 {
        let FanoutEvent::Record(record) = sub.recv().await.unwrap() else {
            panic!("expected record");
        };
        sequences.push(record.sequence_number);
        keys.insert(record.idempotency_key());
    }
    // The missed span arrives in order, each mutation exactly once.
    assert_eq!(sequences, vec![2, 3, 4]);
    assert_eq!(keys.len(), 3);

    // Live delivery continues past the replayed span.
    confirm_block(&engine, 12, hash(0x12), hash(0x11), &[5]).await;
    let FanoutEvent::Record(live) = sub.recv().await.unwrap() else {
        panic!("expected record");
    };
    assert_eq!(live.sequence_number, 5);
    assert_eq!(*live.pubkey(), pubkey(5));
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_rejected_once_span_aged_out() {
    let config = EngineConfig {
        resolver_shards: 1,
        partitions: 1,
        replay_window: 4,
        ..EngineConfig::default()
    };
    let engine = engine_runtime::Engine::new(&config).unwrap();
    let mut sub = engine.subscribe(EventFilter::all(), None).unwrap();

    confirm_block(&engine, 10, hash(0x10), hash(0x09), &[1]).await;
    let FanoutEvent::Record(observed) = sub.recv().await.unwrap() else {
        panic!("expected record");
    };
    let token = ResumeToken {
        slot: observed.slot(),
        write_version: observed.ordering_key().write_version,
        commitment_level: shared_types::CommitmentLevel::Confirmed,
        sequence_number: observed.sequence_number,
        partition: observed.partition,
        checkpoint_hash: observed.checkpoint_hash,
        subscription_id: Uuid::new_v4(),
    };

    // Enough further commits to push the observed record out of the
    // retained window.
    confirm_block(&engine, 11, hash(0x11), hash(0x10), &[2, 3, 4, 5, 6, 7]).await;

    let err = engine
        .subscribe(EventFilter::all(), Some(token))
        .err()
        .expect("aged-out token must be refused");
    assert!(matches!(
        err,
        SubscribeError::ResumeInvalid(ResumeInvalid::AgedOut { .. })
    ));
    engine.shutdown().await.unwrap();
}
