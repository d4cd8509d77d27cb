//! # engine-runtime
//!
//! Wiring for the Account Change Propagation Engine: builds the
//! normalization, fork-resolution, commit-log, sink-apply, and fan-out
//! subsystems into one running pipeline.
//!
//! The outer serving layer (network intake, query/gateway surface) is
//! not part of this crate; it drives the [`Engine`] through its ingest
//! and subscription boundaries.

pub mod config;
pub mod engine;
pub mod gateway;
pub mod source;

pub use config::{EngineConfig, RetryConfig};
pub use engine::{Engine, EngineIngest};
pub use gateway::LogGateway;
pub use source::{ChannelSource, IngestSource, SourceEvent, SourceFeed};
