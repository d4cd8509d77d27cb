//! Sink-apply ports.

pub mod outbound;
