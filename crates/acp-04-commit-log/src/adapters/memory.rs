//! In-memory `LogTransport` adapter.

use crate::error::CommitLogResult;
use crate::ports::outbound::LogTransport;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::SequencedRecord;

/// Append-only in-memory transport. Used by the runtime's default wiring
/// and by tests; a production deployment substitutes a durable store.
#[derive(Default)]
pub struct InMemoryTransport {
    appended: Mutex<Vec<SequencedRecord>>,
}

impl InMemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records appended so far.
    pub fn len(&self) -> usize {
        self.appended.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.appended.lock().is_empty()
    }

    /// Snapshot of everything appended, in arrival order.
    pub fn snapshot(&self) -> Vec<SequencedRecord> {
        self.appended.lock().clone()
    }
}

#[async_trait]
impl LogTransport for InMemoryTransport {
    async fn append(&self, batch: &[SequencedRecord]) -> CommitLogResult<()> {
        self.appended.lock().extend_from_slice(batch);
        Ok(())
    }
}
