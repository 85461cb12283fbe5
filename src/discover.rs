//! Program discovery for the server process.
//!
//! Locates what to execute given only the working directory contents: a
//! script distribution (`unblock*`/`server*` directory containing `app.js`,
//! run through node) or a packaged executable (`unblock*`). First match in
//! directory-enumeration order wins; there is no tie-break beyond that.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::process::Command;

/// Entry point file expected inside a script distribution directory.
const SCRIPT_ENTRY: &str = "app.js";

/// Bound on the `node -v` availability probe.
const NODE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A discovered program plus the arguments discovery itself mandates
/// (the script path when running through node).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub program: String,
    pub args: Vec<String>,
}

/// Why discovery produced no program to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverError {
    /// A script distribution was found but node is not installed. Scanning
    /// stops here instead of falling through silently.
    NodeMissing,
    /// Nothing in the directory matched.
    NotFound,
}

impl std::fmt::Display for DiscoverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoverError::NodeMissing => write!(f, "Node.js is not installed."),
            DiscoverError::NotFound => write!(f, "Server not found."),
        }
    }
}

/// Probes whether a node interpreter is available on the system path.
///
/// Attempts to start `node -v` and waits a bounded time for it to finish.
/// A successful spawn counts as available even if the wait times out.
pub async fn probe_node() -> bool {
    let child = Command::new("node")
        .arg("-v")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();
    match child {
        Ok(mut child) => {
            let _ = tokio::time::timeout(NODE_PROBE_TIMEOUT, child.wait()).await;
            true
        }
        Err(_) => false,
    }
}

/// Scans `dir` for a server to run.
///
/// Directories matching `unblock*` or `server*` with an `app.js` entry point
/// take priority; loose executables matching `unblock*` (`unblock*.exe` on
/// Windows) come second. Multiple matches resolve to whichever the directory
/// enumeration yields first.
pub fn find_server(dir: &Path, has_node: bool) -> Result<Discovery, DiscoverError> {
    let entries = read_entries(dir);

    let script_dirs = script_dir_patterns();
    for path in &entries {
        if !path.is_dir() {
            continue;
        }
        if !matches_name(&script_dirs, path) {
            continue;
        }
        let entry_point = path.join(SCRIPT_ENTRY);
        if entry_point.is_file() {
            if has_node {
                return Ok(Discovery {
                    program: "node".to_string(),
                    args: vec![entry_point.to_string_lossy().into_owned()],
                });
            }
            return Err(DiscoverError::NodeMissing);
        }
    }

    let binaries = binary_patterns();
    for path in &entries {
        if !path.is_file() {
            continue;
        }
        if matches_name(&binaries, path) {
            return Ok(Discovery {
                program: path.to_string_lossy().into_owned(),
                args: Vec::new(),
            });
        }
    }

    Err(DiscoverError::NotFound)
}

fn read_entries(dir: &Path) -> Vec<PathBuf> {
    let Ok(read) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    read.filter_map(|entry| entry.ok().map(|e| e.path())).collect()
}

fn matches_name(set: &GlobSet, path: &Path) -> bool {
    path.file_name()
        .map(|name| set.is_match(Path::new(name)))
        .unwrap_or(false)
}

fn script_dir_patterns() -> GlobSet {
    build_globs(&["unblock*", "server*"])
}

#[cfg(windows)]
fn binary_patterns() -> GlobSet {
    build_globs(&["unblock*.exe"])
}

#[cfg(not(windows))]
fn binary_patterns() -> GlobSet {
    build_globs(&["unblock*"])
}

fn build_globs(patterns: &[&str]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).expect("static glob pattern"));
    }
    builder.build().expect("static glob set")
}
