//! Launch spec construction.
//!
//! Turns a configuration snapshot into the argument list and environment
//! overlay for one server invocation. Construction is pure and deterministic:
//! the same snapshot always yields the same `LaunchSpec`.

use std::collections::HashMap;

use crate::config::{Config, ParamValue};

const LOG_LEVEL_KEY: &str = "LOG_LEVEL";

/// The resolved program, argument list, and environment overlay for one
/// server invocation. Computed fresh on every (re)start, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Program name or path (an interpreter or a discovered executable).
    pub program: String,
    /// Ordered argument list, discovery args first, then config args.
    pub args: Vec<String>,
    /// Environment overlay applied on top of the inherited environment.
    pub env: HashMap<String, String>,
}

impl LaunchSpec {
    /// Builds the spec from a discovered program and a config snapshot.
    pub fn new(program: String, mut args: Vec<String>, config: &Config) -> Self {
        args.extend(build_args(config));
        Self {
            program,
            args,
            env: build_env(config),
        }
    }

    /// Renders the full command line for the debug log.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.args.len());
        parts.push(self.program.clone());
        parts.extend(self.args.clone());
        shell_words::join(parts)
    }
}

/// Serializes the ordered parameter list into command-line arguments.
///
/// Boolean flags emit the bare prefix when set; string values emit prefix
/// then value when non-empty; lists emit prefix then each element. Free-form
/// `other` entries are appended last, each split into whitespace-separated
/// tokens so a single entry can carry a pre-formed multi-token flag.
pub fn build_args(config: &Config) -> Vec<String> {
    let mut args = Vec::new();
    for param in config.params() {
        match param.value {
            ParamValue::Flag(set) => {
                if set {
                    args.push(param.prefix.to_string());
                }
            }
            ParamValue::Value(value) => {
                if !value.is_empty() {
                    args.push(param.prefix.to_string());
                    args.push(value);
                }
            }
            ParamValue::List(values) => {
                if !values.is_empty() {
                    args.push(param.prefix.to_string());
                    args.extend(values);
                }
            }
        }
    }
    for entry in &config.other {
        args.extend(split_entry(entry));
    }
    args
}

// shell-words handles quoted tokens; malformed quoting falls back to a plain
// whitespace split rather than dropping the entry.
fn split_entry(entry: &str) -> Vec<String> {
    match shell_words::split(entry) {
        Ok(parts) => parts,
        Err(_) => entry.split_whitespace().map(|s| s.to_string()).collect(),
    }
}

/// Builds the environment overlay from the raw `KEY=VALUE` override list.
///
/// Entries are split at the first `=`; entries without `=` or with an empty
/// key contribute nothing. With `debug_info` set, `LOG_LEVEL=debug` is
/// injected unless an explicit override already names `LOG_LEVEL`.
pub fn build_env(config: &Config) -> HashMap<String, String> {
    let mut env = HashMap::new();
    for entry in &config.env {
        if let Some((key, value)) = entry.split_once('=') {
            if !key.is_empty() {
                env.insert(key.to_string(), value.to_string());
            }
        }
    }
    if config.debug_info && !env.contains_key(LOG_LEVEL_KEY) {
        env.insert(LOG_LEVEL_KEY.to_string(), "debug".to_string());
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn base_config() -> Config {
        Config::default()
    }

    #[test]
    fn construction_is_deterministic() {
        let mut config = base_config();
        config.port = "8080".into();
        config.sources = vec!["kuwo".into(), "bilibili".into()];
        config.strict = true;
        config.other = vec!["-e https://music.163.com".into()];
        config.env = vec!["A=1".into(), "B=2".into()];
        let first = LaunchSpec::new("node".into(), vec!["app.js".into()], &config);
        let second = LaunchSpec::new("node".into(), vec!["app.js".into()], &config);
        assert_eq!(first, second);
    }

    #[test]
    fn false_flag_never_appears() {
        let mut config = base_config();
        config.strict = false;
        assert!(!build_args(&config).contains(&"-s".to_string()));
    }

    #[test]
    fn true_flag_appears_exactly_once() {
        let mut config = base_config();
        config.strict = true;
        let args = build_args(&config);
        assert_eq!(args.iter().filter(|a| *a == "-s").count(), 1);
    }

    #[test]
    fn empty_value_is_skipped() {
        let config = base_config();
        let args = build_args(&config);
        assert!(args.is_empty());
    }

    #[test]
    fn value_follows_its_prefix() {
        let mut config = base_config();
        config.port = "8080".into();
        config.address = "0.0.0.0".into();
        let args = build_args(&config);
        assert_eq!(args, vec!["-p", "8080", "-a", "0.0.0.0"]);
    }

    #[test]
    fn list_keeps_prefix_then_elements_in_order() {
        let mut config = base_config();
        config.sources = vec!["a".into(), "b".into()];
        let args = build_args(&config);
        assert_eq!(args, vec!["-o", "a", "b"]);
    }

    #[test]
    fn other_entries_split_on_whitespace() {
        let mut config = base_config();
        config.other = vec!["-e https://music.163.com".into(), "-t".into()];
        let args = build_args(&config);
        assert_eq!(args, vec!["-e", "https://music.163.com", "-t"]);
    }

    #[test]
    fn other_with_unbalanced_quote_falls_back_to_whitespace() {
        let mut config = base_config();
        config.other = vec!["-x it's".into()];
        let args = build_args(&config);
        assert_eq!(args, vec!["-x", "it's"]);
    }

    #[test]
    fn config_args_follow_discovery_args() {
        let mut config = base_config();
        config.port = "8080".into();
        let spec = LaunchSpec::new("node".into(), vec!["serverApp/app.js".into()], &config);
        assert_eq!(spec.program, "node");
        assert_eq!(spec.args, vec!["serverApp/app.js", "-p", "8080"]);
    }

    #[test]
    fn explicit_log_level_wins_over_debug_default() {
        let mut config = base_config();
        config.env = vec!["LOG_LEVEL=info".into()];
        config.debug_info = true;
        let env = build_env(&config);
        assert_eq!(env.get("LOG_LEVEL").map(String::as_str), Some("info"));
    }

    #[test]
    fn debug_injects_log_level() {
        let mut config = base_config();
        config.debug_info = true;
        let env = build_env(&config);
        assert_eq!(env.get("LOG_LEVEL").map(String::as_str), Some("debug"));
    }

    #[test]
    fn entry_without_equals_is_ignored() {
        let mut config = base_config();
        config.env = vec!["BADENTRY".into(), "GOOD=1".into()];
        let env = build_env(&config);
        assert!(!env.contains_key("BADENTRY"));
        assert_eq!(env.get("GOOD").map(String::as_str), Some("1"));
    }

    #[test]
    fn entry_with_empty_key_is_ignored() {
        let mut config = base_config();
        config.env = vec!["=value".into()];
        let env = build_env(&config);
        assert!(env.is_empty());
    }

    #[test]
    fn value_may_contain_equals() {
        let mut config = base_config();
        config.env = vec!["OPTS=a=b".into()];
        let env = build_env(&config);
        assert_eq!(env.get("OPTS").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn command_line_quotes_arguments() {
        let mut config = base_config();
        config.url = "http://music.163.com/?a=1 b".into();
        let spec = LaunchSpec::new("node".into(), vec!["app.js".into()], &config);
        let line = spec.command_line();
        assert!(line.starts_with("node app.js -u"));
        assert!(line.contains('\''));
    }
}
