//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gamewalk_core::{SelectionPolicy, SourceKind};

#[derive(Parser)]
#[command(name = "gamewalk", version, about = "Turn walking steps into game input over UDP")]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/gamewalk/config.toml)
    #[arg(long, short = 'c', global = true, env = "GAMEWALK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless GAMEWALK_LOG / RUST_LOG say otherwise
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Classify recorded sensor readings and send a STEP per step
    Send(SendOpts),
    /// Receive STEP datagrams and report them (game host side)
    Listen(ListenOpts),
    /// Send STEP datagrams without sensors, to check the network path
    Probe(ProbeOpts),
}

#[derive(clap::Args)]
pub struct SendOpts {
    /// Receiver host name or address
    #[arg(long, env = "GAMEWALK_HOST")]
    pub host: Option<String>,

    /// Receiver UDP port
    #[arg(long, short = 'p', env = "GAMEWALK_PORT")]
    pub port: Option<u16>,

    /// JSON-lines reading file, or `-` for stdin
    #[arg(long, short = 'i', default_value = "-")]
    pub input: String,

    /// Sensors the device has (default: kinds present in the input)
    #[arg(long, value_delimiter = ',', value_parser = parse_source_kind)]
    pub sensors: Vec<SourceKind>,

    /// observed (pulse + counter) or exclusive (one source)
    #[arg(long)]
    pub selection: Option<SelectionPolicy>,

    /// Pace readings by their timestamps instead of replaying at full speed
    #[arg(long)]
    pub realtime: bool,
}

#[derive(clap::Args)]
pub struct ListenOpts {
    /// UDP port to listen on
    #[arg(long, short = 'p', env = "GAMEWALK_PORT")]
    pub port: Option<u16>,

    /// Receive buffer size in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Print steps and the final status as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct ProbeOpts {
    /// Receiver host name or address
    #[arg(long, env = "GAMEWALK_HOST")]
    pub host: Option<String>,

    /// Receiver UDP port
    #[arg(long, short = 'p', env = "GAMEWALK_PORT")]
    pub port: Option<u16>,

    /// Number of STEP datagrams to send
    #[arg(long, short = 'n', default_value = "1")]
    pub count: u32,

    /// Delay between datagrams in milliseconds
    #[arg(long, default_value = "200")]
    pub interval_ms: u64,
}

fn parse_source_kind(s: &str) -> Result<SourceKind, String> {
    SourceKind::parse(s).ok_or_else(|| {
        format!("unknown sensor {s:?} (expected step_pulse, step_count or accelerometer)")
    })
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_parses_sensor_list_and_policy() {
        let cli = Cli::try_parse_from([
            "gamewalk",
            "send",
            "--host",
            "pc.local",
            "--sensors",
            "count,accel",
            "--selection",
            "exclusive",
            "--realtime",
        ])
        .expect("parse");

        let Command::Send(opts) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(opts.host.as_deref(), Some("pc.local"));
        assert_eq!(opts.sensors, vec![SourceKind::StepCount, SourceKind::Accelerometer]);
        assert_eq!(opts.selection, Some(SelectionPolicy::Exclusive));
        assert!(opts.realtime);
        assert_eq!(opts.input, "-");
    }

    #[test]
    fn unknown_sensor_is_rejected() {
        let result = Cli::try_parse_from(["gamewalk", "send", "--sensors", "gyro"]);
        assert!(result.is_err());
    }

    #[test]
    fn probe_defaults() {
        let cli = Cli::try_parse_from(["gamewalk", "--debug", "probe", "--host", "127.0.0.1"])
            .expect("parse");
        assert!(cli.debug);
        let Command::Probe(opts) = cli.command else {
            panic!("expected probe");
        };
        assert_eq!(opts.count, 1);
        assert_eq!(opts.interval_ms, 200);
    }
}
