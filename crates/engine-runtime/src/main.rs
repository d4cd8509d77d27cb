//! # Account Change Propagation Engine
//!
//! Entry point: loads configuration, initializes telemetry, wires the
//! pipeline, and runs until interrupted.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (JSON file via `ACP_CONFIG`, else defaults,
//!    both overridable by `ACP_*` environment variables)
//! 2. Initialize telemetry (tracing + Prometheus registry)
//! 3. Wire the engine (normalizer, resolver shards, commit log, sink
//!    pipelines, fan-out manager)
//! 4. Spawn one ingest task per configured source
//! 5. Run until Ctrl+C
//! 6. Graceful shutdown: stop intake, drain sinks, close subscriptions

use anyhow::{Context, Result};
use engine_runtime::{ChannelSource, Engine, EngineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

fn load_config() -> Result<EngineConfig> {
    match std::env::var("ACP_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            EngineConfig::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        Err(_) => Ok(EngineConfig::from_env()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_config = acp_telemetry::TelemetryConfig::from_env();
    let _guard = acp_telemetry::init_telemetry(telemetry_config)
        .context("Failed to initialize telemetry")?;

    let config = load_config()?;

    info!("===========================================");
    info!("  Account Change Propagation Engine v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let engine = Arc::new(Engine::new(&config).context("Failed to wire engine")?);

    // One ingest task per configured source. The serving layer holds
    // the feed halves and pushes transport events into them.
    let mut feeds = Vec::new();
    let mut ingest_tasks = Vec::new();
    for source_id in 1..=config.expected_sources {
        let (feed, source) = ChannelSource::new(source_id, config.source_queue_capacity);
        ingest_tasks.push(engine.attach_source(source));
        feeds.push(feed);
    }
    info!(sources = feeds.len(), "Engine is running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    // Stop intake first: closed feeds end the ingest tasks, then the
    // sink pipelines drain.
    drop(feeds);
    for task in ingest_tasks {
        let _ = task.await;
    }
    engine.shutdown().await?;
    Ok(())
}
