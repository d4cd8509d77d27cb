//! Prometheus metrics for the propagation engine.
//!
//! Naming convention: `acp_<subsystem>_<metric>_<unit>`.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // NORMALIZER METRICS
    // =========================================================================

    /// Raw updates accepted into the pipeline
    pub static ref NORMALIZER_ACCEPTED: Counter = Counter::new(
        "acp_normalizer_records_accepted_total",
        "Raw updates validated and accepted"
    ).expect("metric creation failed");

    /// Duplicate updates suppressed by idempotency key
    pub static ref NORMALIZER_DUPLICATES: Counter = Counter::new(
        "acp_normalizer_duplicates_total",
        "Duplicate updates suppressed by idempotency key"
    ).expect("metric creation failed");

    /// Malformed updates rejected
    pub static ref NORMALIZER_REJECTED: Counter = Counter::new(
        "acp_normalizer_rejected_total",
        "Malformed updates rejected at ingest"
    ).expect("metric creation failed");

    // =========================================================================
    // FORK RESOLVER METRICS
    // =========================================================================

    /// Fork rollbacks performed
    pub static ref RESOLVER_REORGS: Counter = Counter::new(
        "acp_resolver_reorgs_total",
        "Fork rollbacks detected and compensated"
    ).expect("metric creation failed");

    /// Records dropped on abandoned branches
    pub static ref RESOLVER_RECORDS_DROPPED: Counter = Counter::new(
        "acp_resolver_records_dropped_total",
        "Records discarded with abandoned blocks"
    ).expect("metric creation failed");

    /// Blocks declared canonical
    pub static ref RESOLVER_BLOCKS_CANONICAL: Counter = Counter::new(
        "acp_resolver_blocks_canonicalized_total",
        "Blocks declared canonical"
    ).expect("metric creation failed");

    // =========================================================================
    // WATERMARK METRICS
    // =========================================================================

    /// Aggregate confirmed slot
    pub static ref WATERMARK_CONFIRMED: Gauge = Gauge::new(
        "acp_watermark_confirmed_slot",
        "Aggregate confirmed slot across healthy sources"
    ).expect("metric creation failed");

    /// Aggregate finalized slot
    pub static ref WATERMARK_FINALIZED: Gauge = Gauge::new(
        "acp_watermark_finalized_slot",
        "Aggregate finalized slot across healthy sources"
    ).expect("metric creation failed");

    // =========================================================================
    // COMMIT LOG METRICS
    // =========================================================================

    /// Records committed to the log
    pub static ref COMMITS_TOTAL: Counter = Counter::new(
        "acp_commitlog_records_committed_total",
        "Canonical records sequenced into the commit log"
    ).expect("metric creation failed");

    /// Compensating tombstones committed
    pub static ref TOMBSTONES_TOTAL: Counter = Counter::new(
        "acp_commitlog_tombstones_total",
        "Compensating tombstones sequenced into the commit log"
    ).expect("metric creation failed");

    // =========================================================================
    // SINK APPLY METRICS
    // =========================================================================

    /// Records applied per sink
    pub static ref SINK_APPLIED: CounterVec = CounterVec::new(
        Opts::new("acp_sink_applied_total", "Records applied per sink"),
        &["sink"]
    ).expect("metric creation failed");

    /// Transient retries per sink
    pub static ref SINK_RETRIES: CounterVec = CounterVec::new(
        Opts::new("acp_sink_retries_total", "Transient apply retries per sink"),
        &["sink"]
    ).expect("metric creation failed");

    /// Apply latency
    pub static ref SINK_APPLY_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "acp_sink_apply_duration_seconds",
            "Time spent applying one record to a sink"
        ).buckets(exponential_buckets(0.0001, 2.0, 12).unwrap())
    ).expect("metric creation failed");

    // =========================================================================
    // FAN-OUT METRICS
    // =========================================================================

    /// Live subscribers
    pub static ref FANOUT_SUBSCRIBERS: Gauge = Gauge::new(
        "acp_fanout_subscribers",
        "Number of live subscriptions"
    ).expect("metric creation failed");

    /// Queue-full observations
    pub static ref FANOUT_OVERFLOWS: Counter = Counter::new(
        "acp_fanout_overflow_total",
        "Subscriber queue-full observations"
    ).expect("metric creation failed");

    /// Events delivered to subscriber queues
    pub static ref FANOUT_DELIVERED: Counter = Counter::new(
        "acp_fanout_delivered_total",
        "Events queued for delivery to subscribers"
    ).expect("metric creation failed");
}

/// Handle that keeps the registry alive.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all engine metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(NORMALIZER_ACCEPTED.clone()),
        Box::new(NORMALIZER_DUPLICATES.clone()),
        Box::new(NORMALIZER_REJECTED.clone()),
        Box::new(RESOLVER_REORGS.clone()),
        Box::new(RESOLVER_RECORDS_DROPPED.clone()),
        Box::new(RESOLVER_BLOCKS_CANONICAL.clone()),
        Box::new(WATERMARK_CONFIRMED.clone()),
        Box::new(WATERMARK_FINALIZED.clone()),
        Box::new(COMMITS_TOTAL.clone()),
        Box::new(TOMBSTONES_TOTAL.clone()),
        Box::new(SINK_APPLIED.clone()),
        Box::new(SINK_RETRIES.clone()),
        Box::new(SINK_APPLY_DURATION.clone()),
        Box::new(FANOUT_SUBSCRIBERS.clone()),
        Box::new(FANOUT_OVERFLOWS.clone()),
        Box::new(FANOUT_DELIVERED.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
