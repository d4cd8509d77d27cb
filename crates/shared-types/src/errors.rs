//! # Error Types
//!
//! Errors shared across subsystem boundaries. Subsystem-local failures
//! live in each crate's own `error.rs`.

use thiserror::Error;

/// Errors decoding an opaque resume token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The byte string was not a valid token encoding.
    #[error("Malformed resume token: {reason}")]
    Malformed { reason: String },
}

/// Why a subscription could not resume from a supplied token.
///
/// Both variants are deliberate, explicit loss-of-continuity signals:
/// the caller must resubscribe from the current tip.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResumeInvalid {
    /// The branch the token was minted on has been rolled back.
    #[error("Resume token bound to a rolled-back branch (sequence {sequence_number})")]
    CheckpointMismatch { sequence_number: u64 },

    /// The sequence number has aged out of the retained replay window.
    #[error("Resume point {sequence_number} aged out of the replay window (oldest retained: {oldest_retained})")]
    AgedOut {
        sequence_number: u64,
        oldest_retained: u64,
    },

    /// The token bytes did not decode.
    #[error("Resume token undecodable: {0}")]
    Undecodable(#[from] TokenError),
}
