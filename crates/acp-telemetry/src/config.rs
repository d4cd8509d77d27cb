//! Telemetry configuration.

/// How logging behaves. Read once at startup.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name stamped into log lines.
    pub service_name: String,
    /// Default log level filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// JSON output for containerized deployments.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "acp-engine".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Build from `ACP_*` environment variables, with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("ACP_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: std::env::var("ACP_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logs: std::env::var("ACP_LOG_JSON").map(|v| v == "1").unwrap_or(false),
        }
    }
}
