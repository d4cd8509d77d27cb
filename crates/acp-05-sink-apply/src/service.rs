//! Sink Apply Coordinator - Core business logic

use crate::domain::retry::RetryPolicy;
use crate::error::{SinkApplyError, SinkApplyResult, SinkError};
use crate::ports::outbound::Sink;
use acp_telemetry::metrics::{SINK_APPLIED, SINK_APPLY_DURATION, SINK_RETRIES};
use parking_lot::Mutex;
use shared_types::SequencedRecord;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Coordinator configuration.
#[derive(Clone, Copy, Debug)]
pub struct SinkApplyConfig {
    /// Bounded queue depth per sink pipeline. Dispatch applies
    /// backpressure when a queue is full; records are never dropped.
    pub queue_capacity: usize,
    /// Backoff schedule for transient sink failures.
    pub retry: RetryPolicy,
    /// How long shutdown waits for in-flight applies to finish.
    pub drain_timeout: Duration,
}

impl Default for SinkApplyConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_024,
            retry: RetryPolicy::default(),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// Health snapshot for one registered sink.
#[derive(Debug, Clone)]
pub struct SinkHealth {
    pub name: String,
    /// Raised while the pipeline is retrying a transient failure.
    pub degraded: bool,
    /// Set when a permanent failure stopped the pipeline.
    pub stopped: bool,
    /// Records applied so far.
    pub applied: u64,
    /// The sink's own durable cursor.
    pub cursor: u64,
}

#[derive(Default)]
struct PipelineStatus {
    degraded: AtomicBool,
    stopped: AtomicBool,
    applied: AtomicU64,
}

struct PipelineHandle {
    name: String,
    tx: mpsc::Sender<SequencedRecord>,
    join: JoinHandle<()>,
    status: Arc<PipelineStatus>,
    sink: Arc<dyn Sink>,
}

/// Drives committed records into every registered sink, one isolated
/// pipeline per sink.
pub struct SinkApplyCoordinator {
    config: SinkApplyConfig,
    pipelines: Mutex<Vec<PipelineHandle>>,
}

impl SinkApplyCoordinator {
    #[must_use]
    pub fn new(config: SinkApplyConfig) -> Self {
        Self {
            config,
            pipelines: Mutex::new(Vec::new()),
        }
    }

    /// Register a sink and start its pipeline task.
    pub fn register_sink(&self, sink: Arc<dyn Sink>) -> SinkApplyResult<()> {
        let name = sink.name().to_owned();
        let mut pipelines = self.pipelines.lock();
        if pipelines.iter().any(|p| p.name == name) {
            return Err(SinkApplyError::DuplicateSink { name });
        }

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let status = Arc::new(PipelineStatus::default());
        let join = tokio::spawn(run_pipeline(
            sink.clone(),
            rx,
            self.config.retry,
            status.clone(),
        ));
        info!(sink = %name, "Registered sink pipeline");
        pipelines.push(PipelineHandle {
            name,
            tx,
            join,
            status,
            sink,
        });
        Ok(())
    }

    /// Fan one committed record out to every live pipeline, waiting on
    /// full queues rather than dropping.
    pub async fn dispatch(&self, record: &SequencedRecord) {
        let senders: Vec<(String, mpsc::Sender<SequencedRecord>)> = self
            .pipelines
            .lock()
            .iter()
            .filter(|p| !p.status.stopped.load(Ordering::Relaxed))
            .map(|p| (p.name.clone(), p.tx.clone()))
            .collect();

        for (name, tx) in senders {
            if tx.send(record.clone()).await.is_err() {
                warn!(sink = %name, "Pipeline closed; record not delivered to it");
            }
        }
    }

    /// Health of every registered sink.
    pub fn health(&self) -> Vec<SinkHealth> {
        self.pipelines
            .lock()
            .iter()
            .map(|p| SinkHealth {
                name: p.name.clone(),
                degraded: p.status.degraded.load(Ordering::Relaxed),
                stopped: p.status.stopped.load(Ordering::Relaxed),
                applied: p.status.applied.load(Ordering::Relaxed),
                cursor: p.sink.current_cursor(),
            })
            .collect()
    }

    /// Stop intake and drain each pipeline within the configured
    /// timeout. Pipelines that fail to drain are aborted and reported.
    pub async fn shutdown(&self) -> SinkApplyResult<()> {
        let pipelines = std::mem::take(&mut *self.pipelines.lock());
        let mut first_error = None;

        for mut pipeline in pipelines {
            drop(pipeline.tx);
            match tokio::time::timeout(self.config.drain_timeout, &mut pipeline.join).await {
                Ok(_) => {
                    info!(sink = %pipeline.name, "Pipeline drained");
                }
                Err(_) => {
                    error!(sink = %pipeline.name, "Pipeline drain timed out; aborting");
                    pipeline.join.abort();
                    if first_error.is_none() {
                        first_error = Some(SinkApplyError::DrainTimeout {
                            name: pipeline.name,
                        });
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

async fn run_pipeline(
    sink: Arc<dyn Sink>,
    mut rx: mpsc::Receiver<SequencedRecord>,
    retry: RetryPolicy,
    status: Arc<PipelineStatus>,
) {
    while let Some(record) = rx.recv().await {
        let mut attempt: u32 = 0;
        loop {
            let started = std::time::Instant::now();
            match sink.apply(&record).await {
                Ok(_) => {
                    SINK_APPLY_DURATION.observe(started.elapsed().as_secs_f64());
                    SINK_APPLIED.with_label_values(&[sink.name()]).inc();
                    status.applied.fetch_add(1, Ordering::Relaxed);
                    status.degraded.store(false, Ordering::Relaxed);
                    break;
                }
                Err(SinkError::Transient { reason }) => {
                    SINK_RETRIES.with_label_values(&[sink.name()]).inc();
                    status.degraded.store(true, Ordering::Relaxed);
                    let delay = retry.delay_for(attempt);
                    warn!(
                        sink = sink.name(),
                        sequence = record.sequence_number,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "Transient sink failure; backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(SinkError::Permanent { reason }) => {
                    error!(
                        sink = sink.name(),
                        sequence = record.sequence_number,
                        %reason,
                        "Permanent sink failure; stopping pipeline"
                    );
                    status.stopped.store(true, Ordering::Relaxed);
                    return;
                }
            }
        }
    }
}
