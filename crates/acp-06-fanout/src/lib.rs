//! # acp-06-fanout
//!
//! Subscription Fan-out & Resume Manager: delivers canonical records to
//! live subscribers and lets them reconnect without silent data loss.
//!
//! ## Overview
//!
//! This subsystem provides:
//! - **Filtered fan-out**: per-subscriber bounded queues, filters by
//!   account set, owner set, and minimum slot
//! - **At-least-once delivery**: every record embeds its IdempotencyKey;
//!   consumers de-duplicate on their side
//! - **Resume tokens**: an opaque cursor bound to a branch of history;
//!   a valid token resumes just after its sequence, a stale one fails
//!   with an explicit `ResumeInvalid`
//! - **Overflow discipline**: a subscriber that cannot drain within the
//!   grace period is terminated with a resume token at its last queued
//!   sequence, never silently skipped past

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::filter::EventFilter;
pub use error::{FanoutError, FanoutResult, SubscribeError};
pub use ports::outbound::ReplaySource;
pub use service::{FanoutConfig, FanoutEvent, Subscription, SubscriptionManager};
