//! Fan-out ports.

pub mod outbound;
