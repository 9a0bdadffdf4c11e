//! `gamewalk listen`: the game-host side. Prints every received step.

use std::sync::Arc;

use anyhow::Context;
use gamewalk_transmitter::{ConnectionStatus, ListenerStatus, ReceivedStep, StepListener};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::ListenOpts;
use crate::config::FileConfig;
use crate::shutdown;

pub async fn cmd_listen(opts: ListenOpts, file: &FileConfig) -> anyhow::Result<()> {
    let port = file.listen_port(opts.port);
    let buffer_size = file.buffer_size(opts.buffer_size);

    let listener = Arc::new(
        StepListener::bind(port, buffer_size)
            .await
            .context("cannot start step listener")?,
    );
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<ReceivedStep>(64);

    let task = {
        let listener = Arc::clone(&listener);
        let cancel = cancel.clone();
        tokio::spawn(async move { listener.run(tx, cancel).await })
    };

    if !opts.json {
        eprintln!("listening for steps on udp port {}", listener.status().port);
    }

    let shutdown = shutdown::signal();
    tokio::pin!(shutdown);

    let mut total = 0u64;
    loop {
        tokio::select! {
            Some(step) = rx.recv() => {
                total += 1;
                println!("{}", format_step(&step, total, opts.json));
            }
            () = &mut shutdown => break,
            else => break,
        }
    }

    // Nothing reads past this point.
    drop(rx);
    cancel.cancel();
    task.await.context("listener task panicked")??;

    let status = listener.status();
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", format_status(&status));
    }
    Ok(())
}

fn format_step(step: &ReceivedStep, total: u64, json: bool) -> String {
    if json {
        serde_json::json!({
            "from": step.from.to_string(),
            "at": step.at.to_rfc3339(),
            "total": total,
        })
        .to_string()
    } else {
        format!(
            "{}  STEP #{total} from {}",
            step.at.format("%H:%M:%S%.3f"),
            step.from
        )
    }
}

fn format_status(status: &ListenerStatus) -> String {
    let connection = match &status.connection {
        ConnectionStatus::Disconnected => "disconnected".to_string(),
        ConnectionStatus::Listening => "listening, no sender yet".to_string(),
        ConnectionStatus::Receiving { peer } => format!("receiving from {peer}"),
    };
    let last = status
        .last_step_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());

    let mut out = format!(
        "port {}: {} steps received, {} unknown datagrams, last step {last} ({connection})",
        status.port, status.steps_received, status.unknown_received
    );
    if status.steps_dropped > 0 {
        out.push_str(&format!(", {} not printed", status.steps_dropped));
    }
    out
}
