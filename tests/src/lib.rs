//! # Account Change Propagation Engine Test Suite
//!
//! End-to-end scenarios driving the wired engine through its ingest,
//! subscription, and query boundaries.
//!
//! ```bash
//! # All tests
//! cargo test -p acp-tests
//!
//! # By scenario group
//! cargo test -p acp-tests integration::pipeline
//! cargo test -p acp-tests integration::reorg
//! cargo test -p acp-tests integration::resume
//! ```

#![allow(dead_code)]

pub mod integration;
