//! gamewalk: forwards walking steps to a game as UDP `STEP` datagrams.
//! `send` runs the sensor -> classifier -> transmitter pipeline over recorded
//! readings, `listen` is the receiving end, `probe` checks the network path.

use clap::Parser;

mod cli;
mod cmd_listen;
mod cmd_probe;
mod cmd_send;
mod config;
mod hub;
mod keep_alive;
mod pipeline;
mod replay;
mod shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Loaded before tracing: `[general] debug` sets the default level.
    let file = config::load(args.config.as_deref())?;

    let default_level = if args.debug || file.general.debug {
        "debug"
    } else {
        "info"
    };
    let filter = std::env::var("GAMEWALK_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match &file.source {
        Some(path) => tracing::debug!(path = %path.display(), "config loaded"),
        None => tracing::debug!("no config file, using defaults"),
    }

    match args.command {
        cli::Command::Send(opts) => cmd_send::cmd_send(opts, &file).await?,
        cli::Command::Listen(opts) => cmd_listen::cmd_listen(opts, &file).await?,
        cli::Command::Probe(opts) => cmd_probe::cmd_probe(opts, &file).await?,
    }

    Ok(())
}
