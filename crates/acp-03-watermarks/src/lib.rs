//! # acp-03-watermarks
//!
//! Watermark Tracker: the one piece of process-wide mutable state.
//!
//! ## Overview
//!
//! - Per-source `processed >= confirmed >= finalized` markers
//! - Aggregate view = minimum over currently-healthy sources
//! - Health = the source reported within a liveness timeout; silent
//!   sources are excluded from the aggregate, never blocking progress
//!
//! ## Single-Writer Discipline
//!
//! Only the fork-resolution path calls [`WatermarkTracker::advance`]; all
//! other components read via [`WatermarkTracker::snapshot`] or the
//! [`watch`](tokio::sync::watch) channel from
//! [`WatermarkTracker::subscribe`]. This eliminates write contention by
//! construction.

pub mod error;
pub mod tracker;

pub use error::{WatermarkError, WatermarkResult};
pub use tracker::{WatermarkConfig, WatermarkTracker};
