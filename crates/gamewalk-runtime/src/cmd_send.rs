//! `gamewalk send`: replay recorded readings through the step pipeline.

use std::time::Duration;

use anyhow::Context;
use gamewalk_core::SensorCapabilities;
use gamewalk_transmitter::StatsSnapshot;

use crate::cli::SendOpts;
use crate::config::FileConfig;
use crate::keep_alive::LoggingKeepAlive;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::replay::{self, ReplayHub};
use crate::shutdown;

/// Upper bound on waiting for in-flight sends once the input is exhausted.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn cmd_send(opts: SendOpts, file: &FileConfig) -> anyhow::Result<()> {
    let target = file.target(opts.host.as_deref(), opts.port)?;
    let selection = file.selection(opts.selection);

    let input = opts.input.clone();
    let readings = tokio::task::spawn_blocking(move || replay::load(&input))
        .await?
        .with_context(|| format!("cannot load readings from {}", opts.input))?;
    tracing::info!(readings = readings.len(), input = %opts.input, "readings loaded");

    let mut hub = ReplayHub::new(readings, opts.realtime);
    if !opts.sensors.is_empty() {
        hub = hub.with_capabilities(SensorCapabilities::from_kinds(opts.sensors.iter().copied()));
    }
    let exhausted = hub.exhausted();

    let mut pipeline = Pipeline::start(PipelineConfig { target, selection }, hub, LoggingKeepAlive::new())
        .await
        .context("cannot start step pipeline")?;
    tracing::info!(
        remote = ?pipeline.transmitter().target(),
        sources = ?pipeline.plan().kinds(),
        realtime = opts.realtime,
        "replaying"
    );

    let finished = tokio::select! {
        _ = exhausted.cancelled() => true,
        () = shutdown::signal() => false,
    };

    if finished && !pipeline.settle(SETTLE_TIMEOUT).await {
        tracing::warn!("some sends were still in flight at stop");
    }
    pipeline.stop().await;

    println!("{}", summary(pipeline.steps_detected(), &pipeline.stats()));
    Ok(())
}

fn summary(steps: u64, stats: &StatsSnapshot) -> String {
    let mut out = format!("{steps} steps detected, {} sent", stats.sent);
    if stats.failed > 0 {
        out.push_str(&format!(", {} failed", stats.failed));
    }
    if stats.rejected > 0 {
        out.push_str(&format!(", {} dropped", stats.rejected));
    }
    out
}
