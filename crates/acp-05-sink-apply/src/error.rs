//! Error types for the Sink Apply Coordinator

use thiserror::Error;

/// What a sink reports when an apply fails.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Worth retrying; the pipeline backs off and holds its cursor.
    #[error("Transient sink failure: {reason}")]
    Transient { reason: String },

    /// Not worth retrying; the pipeline stops and the sink is reported
    /// unhealthy.
    #[error("Permanent sink failure: {reason}")]
    Permanent { reason: String },
}

/// Coordinator-level errors.
#[derive(Debug, Error)]
pub enum SinkApplyError {
    /// A sink with this name is already registered.
    #[error("Duplicate sink name: {name}")]
    DuplicateSink { name: String },

    /// Shutdown could not drain a pipeline within the configured timeout.
    #[error("Drain timeout expired for sink {name}")]
    DrainTimeout { name: String },
}

/// Result type for coordinator operations.
pub type SinkApplyResult<T> = Result<T, SinkApplyError>;
