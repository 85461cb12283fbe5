//! Configuration model for the server process.
//!
//! This module defines the structure of the `unblockr.toml` configuration
//! file and the ordered parameter list the supervisor turns into a command
//! line. The supervisor only ever reads a snapshot of this struct; it is
//! mutated by the CLI layer and persisted here.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "unblockr.toml";

/// Startup parameters for the UnblockNeteaseMusic server plus shell settings.
///
/// Every field is optional in the file; missing fields take their defaults so
/// a config written by an older version keeps loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server listen port (`-p`).
    pub port: String,
    /// Server bind address (`-a`).
    pub address: String,
    /// Override for the NetEase server URL (`-u`).
    pub url: String,
    /// Force hostname resolution (`-f`).
    pub host: String,
    /// Music source names, in priority order (`-o`).
    pub sources: Vec<String>,
    /// Enable strict mode (`-s`).
    pub strict: bool,
    /// Free-form extra arguments, each entry split on whitespace.
    pub other: Vec<String>,
    /// Raw `KEY=VALUE` environment overrides for the server process.
    pub env: Vec<String>,
    /// Ask the server for debug logging and echo the spawned command line.
    pub debug_info: bool,
    /// Register the shell to start on login (via platform services).
    pub startup: bool,
    /// UI theme name.
    pub theme: String,
}

/// The typed value of one named parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// A boolean flag; emitted as the bare prefix when true.
    Flag(bool),
    /// A single string value; emitted as `prefix value` when non-empty.
    Value(String),
    /// A list of strings; emitted as `prefix v1 v2 ...` when non-empty.
    List(Vec<String>),
}

/// One named configuration entry mapped to a command-line flag.
///
/// The prefix is fixed per parameter identity.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: &'static str,
    pub prefix: &'static str,
    pub value: ParamValue,
}

impl Config {
    /// Returns the ordered parameter list for argument construction.
    ///
    /// The order is part of the launch contract: port, address, url, host,
    /// sources, strict.
    pub fn params(&self) -> Vec<Param> {
        vec![
            Param {
                name: "port",
                prefix: "-p",
                value: ParamValue::Value(self.port.clone()),
            },
            Param {
                name: "address",
                prefix: "-a",
                value: ParamValue::Value(self.address.clone()),
            },
            Param {
                name: "url",
                prefix: "-u",
                value: ParamValue::Value(self.url.clone()),
            },
            Param {
                name: "host",
                prefix: "-f",
                value: ParamValue::Value(self.host.clone()),
            },
            Param {
                name: "sources",
                prefix: "-o",
                value: ParamValue::List(self.sources.clone()),
            },
            Param {
                name: "strict",
                prefix: "-s",
                value: ParamValue::Flag(self.strict),
            },
        ]
    }
}

/// Splits a free-form source string into individual source names.
///
/// Accepts the separators users paste from the upstream README: commas,
/// periods, CJK punctuation, spaces and newlines.
pub fn parse_sources(text: &str) -> Vec<String> {
    static SEP: OnceLock<Regex> = OnceLock::new();
    let sep = SEP.get_or_init(|| Regex::new(r"[,.'，。 \n]+").expect("source separator regex"));
    sep.split(text)
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

/// Loads and parses the configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Writes the configuration back to a file path.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let raw = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, raw)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let raw = r#"
port = "8080"
address = "0.0.0.0"
url = "http://music.163.com"
host = "59.111.181.38"
sources = ["kuwo", "bilibili"]
strict = true
other = ["-e https://music.163.com"]
env = ["JSON_LOG=true"]
debug_info = true
startup = false
theme = "dark"
"#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.port, "8080");
        assert_eq!(config.sources, vec!["kuwo", "bilibili"]);
        assert!(config.strict);
        assert_eq!(config.other, vec!["-e https://music.163.com"]);
        assert_eq!(config.env, vec!["JSON_LOG=true"]);
        assert!(config.debug_info);
        assert_eq!(config.theme, "dark");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = toml::from_str("port = \"8080\"").unwrap();
        assert_eq!(config.port, "8080");
        assert!(config.address.is_empty());
        assert!(config.sources.is_empty());
        assert!(!config.strict);
        assert!(!config.debug_info);
    }

    #[test]
    fn params_keep_declared_order_and_prefixes() {
        let config = Config::default();
        let params = config.params();
        let pairs: Vec<(&str, &str)> = params.iter().map(|p| (p.name, p.prefix)).collect();
        assert_eq!(
            pairs,
            vec![
                ("port", "-p"),
                ("address", "-a"),
                ("url", "-u"),
                ("host", "-f"),
                ("sources", "-o"),
                ("strict", "-s"),
            ]
        );
    }

    #[test]
    fn parse_sources_splits_on_mixed_separators() {
        let sources = parse_sources("kuwo, bilibili。kugou\nmigu,,");
        assert_eq!(sources, vec!["kuwo", "bilibili", "kugou", "migu"]);
    }

    #[test]
    fn parse_sources_empty_input() {
        assert!(parse_sources("").is_empty());
        assert!(parse_sources(", \n").is_empty());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.port = "8080".into();
        config.sources = vec!["kuwo".into()];
        config.strict = true;
        let raw = toml::to_string_pretty(&config).unwrap();
        let loaded: Config = toml::from_str(&raw).unwrap();
        assert_eq!(loaded.port, "8080");
        assert_eq!(loaded.sources, vec!["kuwo"]);
        assert!(loaded.strict);
    }
}
