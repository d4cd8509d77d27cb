//! Ingest source port.
//!
//! One upstream feed per source; the runtime spawns one task per
//! attached source draining it into the engine's ingest boundary.

use async_trait::async_trait;
use shared_types::{RawAccountUpdate, SlotStatusUpdate, SourceId};
use tokio::sync::mpsc;

/// One event from an upstream feed.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// A raw account mutation.
    Update(RawAccountUpdate),
    /// A per-source watermark report.
    SlotStatus(SlotStatusUpdate),
}

/// Outbound port for an upstream feed.
///
/// One implementation per transport (stream client, file replay, test
/// harness). `next_event` returning `None` ends the feed and its task.
#[async_trait]
pub trait IngestSource: Send + 'static {
    fn source_id(&self) -> SourceId;

    /// The next event, or `None` once the feed is exhausted.
    async fn next_event(&mut self) -> Option<SourceEvent>;
}

/// In-process feed backed by a bounded channel.
///
/// The reference transport: whatever owns the [`SourceFeed`] half
/// pushes events in, the spawned ingest task drains them.
pub struct ChannelSource {
    source_id: SourceId,
    rx: mpsc::Receiver<SourceEvent>,
}

impl ChannelSource {
    #[must_use]
    pub fn new(source_id: SourceId, capacity: usize) -> (SourceFeed, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (SourceFeed { tx }, Self { source_id, rx })
    }
}

#[async_trait]
impl IngestSource for ChannelSource {
    fn source_id(&self) -> SourceId {
        self.source_id
    }

    async fn next_event(&mut self) -> Option<SourceEvent> {
        self.rx.recv().await
    }
}

/// Producer half of a [`ChannelSource`]. Dropping every clone ends the
/// feed.
#[derive(Clone)]
pub struct SourceFeed {
    tx: mpsc::Sender<SourceEvent>,
}

impl SourceFeed {
    /// Queue a raw update. Returns `false` once the ingest task is gone.
    pub async fn update(&self, raw: RawAccountUpdate) -> bool {
        self.tx.send(SourceEvent::Update(raw)).await.is_ok()
    }

    /// Queue a watermark report. Returns `false` once the ingest task
    /// is gone.
    pub async fn slot_status(&self, status: SlotStatusUpdate) -> bool {
        self.tx.send(SourceEvent::SlotStatus(status)).await.is_ok()
    }
}
