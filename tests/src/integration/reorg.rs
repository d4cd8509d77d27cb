//! Fork-choice and rollback scenarios.

use super::*;
use acp_06_fanout::{EventFilter, FanoutEvent, SubscribeError};
use shared_types::{ResumeInvalid, ResumeToken};
use uuid::Uuid;

#[tokio::test]
async fn test_majority_branch_wins_minority_dropped() {
    let engine = test_engine();
    let h1 = hash(0x11);
    let h2 = hash(0x12);
    let parent = hash(0x09);

    for source in 1..=3u32 {
        engine
            .ingest_update(raw_update(
                100,
                1,
                pubkey(source as u8),
                source,
                h1,
                parent,
                100,
            ))
            .await
            .unwrap();
    }
    engine
        .ingest_update(raw_update(100, 1, pubkey(9), 4, h2, parent, 999))
        .await
        .unwrap();

    let summary = engine.ingest_slot_status(slot_status(1, 100)).await.unwrap();
    assert_eq!(summary.blocks_canonicalized, 1);
    assert_eq!(summary.records_dropped, 1);
    assert_eq!(summary.tombstones_emitted, 0);

    let store = engine.state_store().clone();
    wait_for(move || store.account(&pubkey(1)).is_some()).await;
    // The minority block's record never reaches a sink.
    assert!(engine.state_store().account(&pubkey(9)).is_none());

    // No tombstones in the durable log either: the loser never was
    // canonical, so there is nothing to compensate.
    for partition in 0..4 {
        assert!(engine
            .commit_log()
            .retained(partition)
            .iter()
            .all(|r| !r.is_tombstone()));
    }
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deep_reorg_compensates_and_replays() {
    let engine = test_engine();
    let root = hash(0x01);
    let mut sub = engine.subscribe(EventFilter::all(), None).unwrap();

    // Old branch: canonical at slots 50 and 60.
    engine
        .ingest_update(raw_update(50, 1, pubkey(1), 1, hash(0x50), root, 100))
        .await
        .unwrap();
    engine
        .ingest_update(raw_update(60, 1, pubkey(2), 1, hash(0x60), hash(0x50), 200))
        .await
        .unwrap();
    engine.ingest_slot_status(slot_status(1, 60)).await.unwrap();

    let store = engine.state_store().clone();
    wait_for(move || store.account(&pubkey(2)).is_some()).await;
    let finalized_before = engine.watermark().finalized_slot();

    // Mint a token off the first old-branch delivery.
    let FanoutEvent::Record(first_delivered) = sub.recv().await.unwrap() else {
        panic!("expected record");
    };
    let stale_token = ResumeToken {
        slot: first_delivered.slot(),
        write_version: first_delivered.ordering_key().write_version,
        commitment_level: shared_types::CommitmentLevel::Confirmed,
        sequence_number: first_delivered.sequence_number,
        partition: first_delivered.partition,
        checkpoint_hash: first_delivered.checkpoint_hash,
        subscription_id: Uuid::new_v4(),
    };

    // The true chain diverged at slot 50.
    engine
        .ingest_update(raw_update(50, 1, pubkey(3), 2, hash(0xA0), root, 300))
        .await
        .unwrap();
    engine
        .ingest_update(raw_update(90, 1, pubkey(4), 2, hash(0xA9), hash(0xA0), 400))
        .await
        .unwrap();
    let summary = engine.ingest_slot_status(slot_status(1, 90)).await.unwrap();
    assert!(summary.reorg_detected);
    assert_eq!(summary.tombstones_emitted, 2);

    // Tombstones revert the old branch; the new branch applies.
    let store = engine.state_store().clone();
    wait_for(move || {
        store.account(&pubkey(1)).is_none()
            && store.account(&pubkey(2)).is_none()
            && store.account(&pubkey(4)).is_some()
    })
    .await;

    // Sink state equals applying the new branch from scratch.
    let fresh = test_engine();
    fresh
        .ingest_update(raw_update(50, 1, pubkey(3), 2, hash(0xA0), root, 300))
        .await
        .unwrap();
    fresh
        .ingest_update(raw_update(90, 1, pubkey(4), 2, hash(0xA9), hash(0xA0), 400))
        .await
        .unwrap();
    fresh.ingest_slot_status(slot_status(2, 90)).await.unwrap();
    let fresh_store = fresh.state_store().clone();
    wait_for(move || fresh_store.account(&pubkey(4)).is_some()).await;
    for key in [pubkey(1), pubkey(2), pubkey(3), pubkey(4)] {
        assert_eq!(
            engine.state_store().account(&key),
            fresh.state_store().account(&key),
            "state diverges from from-scratch apply"
        );
    }

    // The finalized watermark never regresses through the correction.
    assert!(engine.watermark().finalized_slot() >= finalized_before);

    // Old-branch tokens are stale now.
    let err = engine
        .subscribe(EventFilter::all(), Some(stale_token))
        .err()
        .expect("stale token must be refused");
    assert!(matches!(
        err,
        SubscribeError::ResumeInvalid(ResumeInvalid::CheckpointMismatch { .. })
    ));

    engine.shutdown().await.unwrap();
    fresh.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_late_record_on_abandoned_branch_dropped() {
    let engine = test_engine();
    let parent = hash(0x09);

    for source in 1..=2u32 {
        engine
            .ingest_update(raw_update(
                10,
                1,
                pubkey(source as u8),
                source,
                hash(0x21),
                parent,
                100,
            ))
            .await
            .unwrap();
    }
    engine
        .ingest_update(raw_update(10, 1, pubkey(9), 3, hash(0x22), parent, 100))
        .await
        .unwrap();
    engine.ingest_slot_status(slot_status(1, 10)).await.unwrap();

    let outcome = engine
        .ingest_update(raw_update(10, 2, pubkey(8), 3, hash(0x22), parent, 100))
        .await
        .unwrap();
    assert_eq!(outcome, engine_runtime::EngineIngest::Dropped);
    engine.shutdown().await.unwrap();
}
