//! Optional TOML configuration file.
//!
//! ```toml
//! [network]
//! host = "192.168.1.20"
//! port = 9000
//! buffer_size = 1024
//!
//! [classifier]
//! selection = "observed"
//!
//! [general]
//! debug = false
//! ```
//!
//! Every key is optional. Command-line values win over file values.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use gamewalk_core::SelectionPolicy;
use gamewalk_transmitter::TransmitterConfig;
use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_BUFFER_SIZE: usize = gamewalk_transmitter::listener::DEFAULT_BUFFER_SIZE;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// File this was read from; `None` for built-in defaults.
    #[serde(skip)]
    pub source: Option<PathBuf>,
    pub network: NetworkSection,
    pub classifier: ClassifierSection,
    pub general: GeneralSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSection {
    pub host: Option<String>,
    pub port: u16,
    pub buffer_size: usize,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierSection {
    pub selection: SelectionPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralSection {
    pub debug: bool,
}

/// `$XDG_CONFIG_HOME/gamewalk/config.toml`, else `~/.config/gamewalk/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir).join("gamewalk").join("config.toml"));
    }
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(|home| PathBuf::from(home).join(".config").join("gamewalk").join("config.toml"))
}

/// Load the config file.
///
/// An explicitly named file must exist. The default location is optional.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<FileConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let mut config = parse(&content)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    config.source = Some(path);
    Ok(config)
}

pub fn parse(content: &str) -> anyhow::Result<FileConfig> {
    Ok(toml::from_str(content)?)
}

impl FileConfig {
    /// Transmit target from CLI values, falling back to `[network]`.
    pub fn target(&self, host: Option<&str>, port: Option<u16>) -> anyhow::Result<TransmitterConfig> {
        let host = host
            .map(str::to_owned)
            .or_else(|| self.network.host.clone())
            .filter(|h| !h.trim().is_empty())
            .context("no remote host: pass --host, set GAMEWALK_HOST, or set network.host in the config file")?;
        let port = port.unwrap_or(self.network.port);
        Ok(TransmitterConfig::new(host, port))
    }

    pub fn selection(&self, cli: Option<SelectionPolicy>) -> SelectionPolicy {
        cli.unwrap_or(self.classifier.selection)
    }

    pub fn listen_port(&self, cli: Option<u16>) -> u16 {
        cli.unwrap_or(self.network.port)
    }

    pub fn buffer_size(&self, cli: Option<usize>) -> usize {
        cli.unwrap_or(self.network.buffer_size)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse("").expect("parse");
        assert_eq!(cfg, FileConfig::default());
        assert!(cfg.source.is_none());
        assert_eq!(cfg.network.port, 9000);
        assert_eq!(cfg.network.buffer_size, 1024);
        assert_eq!(cfg.classifier.selection, SelectionPolicy::Observed);
        assert!(!cfg.general.debug);
    }

    #[test]
    fn full_file() {
        let cfg = parse(
            r#"
[network]
host = "192.168.1.20"
port = 9100
buffer_size = 2048

[classifier]
selection = "exclusive"

[general]
debug = true
"#,
        )
        .expect("parse");
        assert_eq!(cfg.network.host.as_deref(), Some("192.168.1.20"));
        assert_eq!(cfg.network.port, 9100);
        assert_eq!(cfg.network.buffer_size, 2048);
        assert_eq!(cfg.classifier.selection, SelectionPolicy::Exclusive);
        assert!(cfg.general.debug);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = parse("[network]\nhost = \"pc.local\"\n").expect("parse");
        assert_eq!(cfg.network.port, DEFAULT_PORT);
        assert_eq!(cfg.network.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn unknown_keys_and_bad_values_are_errors() {
        assert!(parse("[network]\nprot = 9000\n").is_err());
        assert!(parse("[network]\nport = 70000\n").is_err());
        assert!(parse("[classifier]\nselection = \"sometimes\"\n").is_err());
    }

    #[test]
    fn cli_values_override_file() {
        let cfg = parse("[network]\nhost = \"pc.local\"\nport = 9100\n").expect("parse");

        let from_file = cfg.target(None, None).expect("target");
        assert_eq!(from_file.remote_host, "pc.local");
        assert_eq!(from_file.remote_port, 9100);

        let from_cli = cfg.target(Some("10.0.0.2"), Some(9200)).expect("target");
        assert_eq!(from_cli.remote_host, "10.0.0.2");
        assert_eq!(from_cli.remote_port, 9200);

        assert_eq!(cfg.selection(Some(SelectionPolicy::Exclusive)), SelectionPolicy::Exclusive);
        assert_eq!(cfg.selection(None), SelectionPolicy::Observed);
        assert_eq!(cfg.listen_port(None), 9100);
        assert_eq!(cfg.buffer_size(Some(64)), 64);
    }

    #[test]
    fn missing_host_is_an_error() {
        let err = FileConfig::default().target(None, None).expect_err("no host");
        assert!(err.to_string().contains("--host"));
        assert!(FileConfig::default().target(Some("  "), None).is_err());
    }

    #[test]
    fn load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[general]\ndebug = true").expect("write");
        let cfg = load(Some(file.path())).expect("load");
        assert!(cfg.general.debug);
        assert_eq!(cfg.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.toml");
        let err = load(Some(&path)).expect_err("missing");
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn load_malformed_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[network\nport = ").expect("write");
        let err = load(Some(file.path())).expect_err("malformed");
        assert!(format!("{err:#}").contains("invalid config file"));
    }
}
