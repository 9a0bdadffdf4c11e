//! `gamewalk probe`: send synthetic steps to check the network path.

use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use gamewalk_core::{SourceKind, StepEvent};
use gamewalk_transmitter::Transmitter;

use crate::cli::ProbeOpts;
use crate::config::FileConfig;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn cmd_probe(opts: ProbeOpts, file: &FileConfig) -> anyhow::Result<()> {
    let target = file.target(opts.host.as_deref(), opts.port)?;
    let transmitter = Transmitter::new(target);
    let remote = transmitter
        .start()
        .await
        .with_context(|| format!("cannot reach {}", transmitter.config()))?;

    let started = Instant::now();
    for i in 0..opts.count {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(opts.interval_ms)).await;
        }
        transmitter.submit(StepEvent {
            source: SourceKind::StepPulse,
            at_ms: started.elapsed().as_millis() as u64,
        })?;
    }

    transmitter.settle(SETTLE_TIMEOUT).await;
    transmitter.stop().await;

    let stats = transmitter.stats();
    println!(
        "sent {}/{} STEP datagrams to {remote} from {}",
        stats.sent,
        opts.count,
        transmitter
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "?".to_string())
    );
    if stats.failed > 0 {
        bail!("{} of {} datagrams failed", stats.failed, opts.count);
    }
    Ok(())
}
