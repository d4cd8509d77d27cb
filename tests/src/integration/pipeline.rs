//! Happy-path pipeline scenarios: ingest through sink apply and
//! subscriber delivery.

use super::*;
use acp_06_fanout::{EventFilter, FanoutEvent};
use engine_runtime::EngineIngest;

#[tokio::test]
async fn test_update_flows_to_state_store_and_subscriber() {
    let engine = test_engine();
    let mut sub = engine.subscribe(EventFilter::all(), None).unwrap();

    let outcome = engine
        .ingest_update(raw_update(10, 1, pubkey(1), 1, hash(0x10), hash(0x09), 500))
        .await
        .unwrap();
    assert_eq!(outcome, EngineIngest::Buffered);
    assert!(engine.state_store().account(&pubkey(1)).is_none());

    let summary = engine.ingest_slot_status(slot_status(1, 10)).await.unwrap();
    assert_eq!(summary.records_committed, 1);

    let store = engine.state_store().clone();
    wait_for(move || store.account(&pubkey(1)).is_some()).await;
    let view = engine.state_store().account(&pubkey(1)).unwrap();
    assert_eq!(view.lamports, 500);
    assert_eq!(view.slot, 10);

    let FanoutEvent::Record(delivered) = sub.recv().await.unwrap() else {
        panic!("expected record");
    };
    assert_eq!(*delivered.pubkey(), pubkey(1));

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_redelivery_is_suppressed() {
    let engine = test_engine();
    let raw = raw_update(10, 1, pubkey(1), 1, hash(0x10), hash(0x09), 500);

    assert_eq!(
        engine.ingest_update(raw.clone()).await.unwrap(),
        EngineIngest::Buffered
    );
    assert_eq!(
        engine.ingest_update(raw).await.unwrap(),
        EngineIngest::Duplicate
    );

    let summary = engine.ingest_slot_status(slot_status(1, 10)).await.unwrap();
    assert_eq!(summary.records_committed, 1);
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_update_rejected_not_fatal() {
    let engine = test_engine();
    let mut raw = raw_update(10, 1, pubkey(1), 1, hash(0x10), hash(0x09), 500);
    raw.data_hash = [0xFFu8; 32];

    assert_eq!(
        engine.ingest_update(raw).await.unwrap(),
        EngineIngest::Rejected
    );
    // The engine keeps running and accepts the next good update.
    assert_eq!(
        engine
            .ingest_update(raw_update(10, 2, pubkey(1), 1, hash(0x10), hash(0x09), 600))
            .await
            .unwrap(),
        EngineIngest::Buffered
    );
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_per_account_order_survives_out_of_order_ingest() {
    let engine = test_engine();
    let bank = hash(0x10);
    let parent = hash(0x09);

    engine
        .ingest_update(raw_update(10, 3, pubkey(1), 1, bank, parent, 300))
        .await
        .unwrap();
    engine
        .ingest_update(raw_update(10, 1, pubkey(1), 1, bank, parent, 100))
        .await
        .unwrap();
    engine
        .ingest_update(raw_update(10, 2, pubkey(1), 1, bank, parent, 200))
        .await
        .unwrap();
    engine.ingest_slot_status(slot_status(1, 10)).await.unwrap();

    let store = engine.state_store().clone();
    wait_for(move || {
        store
            .account(&pubkey(1))
            .is_some_and(|view| view.write_version == 3)
    })
    .await;
    let view = engine.state_store().account(&pubkey(1)).unwrap();
    assert_eq!(view.write_version, 3);
    assert_eq!(view.lamports, 300);
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_watermark_query_reflects_reports() {
    let engine = test_engine();
    engine.ingest_slot_status(slot_status(1, 100)).await.unwrap();

    let snapshot = engine.watermark();
    assert_eq!(snapshot.confirmed_slot(), 100);
    assert!(snapshot.finalized_slot() <= snapshot.confirmed_slot());
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_sink_health_reports_progress() {
    let engine = test_engine();
    engine
        .ingest_update(raw_update(10, 1, pubkey(1), 1, hash(0x10), hash(0x09), 500))
        .await
        .unwrap();
    engine.ingest_slot_status(slot_status(1, 10)).await.unwrap();

    let store = engine.state_store().clone();
    wait_for(move || store.account(&pubkey(1)).is_some()).await;
    let health = engine.sink_health();
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].name, "memory-state-store");
    assert!(!health[0].stopped);
    assert!(health[0].applied >= 1);
    engine.shutdown().await.unwrap();
}
