//! # acp-telemetry
//!
//! Observability for the Account Change Propagation Engine: structured
//! logging via `tracing` and Prometheus metrics for every subsystem.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use acp_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).expect("telemetry init");
//!     // Logs and metrics are now being collected.
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ACP_LOG_LEVEL` | `info` | Log level filter |
//! | `ACP_LOG_JSON` | unset | Set to `1` for JSON log output |
//! | `ACP_SERVICE_NAME` | `acp-engine` | Service name in logs |

mod config;
pub mod metrics;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, COMMITS_TOTAL, FANOUT_DELIVERED,
    FANOUT_OVERFLOWS, FANOUT_SUBSCRIBERS, NORMALIZER_ACCEPTED, NORMALIZER_DUPLICATES,
    NORMALIZER_REJECTED, RESOLVER_BLOCKS_CANONICAL, RESOLVER_RECORDS_DROPPED, RESOLVER_REORGS,
    SINK_APPLIED, SINK_RETRIES, TOMBSTONES_TOTAL, WATERMARK_CONFIRMED, WATERMARK_FINALIZED,
};

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that must be held for the lifetime of the process;
/// dropping it flushes pending log output.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;
    }

    tracing::info!(service = %config.service_name, "Telemetry initialized");
    Ok(TelemetryGuard {
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active. Drop to flush and shut down.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "acp-engine");
        assert_eq!(config.log_level, "info");
    }
}
