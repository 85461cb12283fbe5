//! Server process lifecycle management.
//!
//! This module contains the `Supervisor`, which owns the single server child
//! process: it locates the program on disk, derives the command line and
//! environment from a configuration snapshot, spawns the process, and relays
//! its output streams into the application's event channel. Failures never
//! escape this boundary; every failure path becomes a reported event.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::discover;
use crate::events::Event;
use crate::launch::LaunchSpec;

/// How long a freshly spawned process gets to prove it started. A child that
/// exits inside this window is treated as a failed start.
const STARTUP_GRACE: Duration = Duration::from_millis(500);

/// Lifecycle state of the supervised server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// No process.
    Idle,
    /// Spawned, waiting out the startup grace window.
    Starting,
    /// Process confirmed running.
    Running,
    /// Tearing a process down (restart or close).
    Stopping,
}

/// Owns the server child process. At most one live handle at a time;
/// `restart` always closes before re-starting.
///
/// The event channel must be unbounded: `start` publishes while it is still
/// awaited by the consumer, so a send that waited for channel capacity would
/// block behind the relay of the child's own output.
pub struct Supervisor {
    work_dir: PathBuf,
    event_tx: mpsc::UnboundedSender<Event>,
    child: Option<tokio::process::Child>,
    status: ServerStatus,
    pid: Option<u32>,
}

impl Supervisor {
    /// Creates a supervisor that discovers programs under `work_dir` and
    /// publishes into `event_tx`.
    pub fn new(work_dir: PathBuf, event_tx: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            work_dir,
            event_tx,
            child: None,
            status: ServerStatus::Idle,
            pid: None,
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Starts the server from a configuration snapshot. Valid only from
    /// `Idle`; every failure is reported as an event and leaves the
    /// supervisor `Idle` with no child.
    pub async fn start(&mut self, config: &Config) {
        if self.status != ServerStatus::Idle || self.child.is_some() {
            return;
        }

        let has_node = discover::probe_node().await;
        let found = match discover::find_server(&self.work_dir, has_node) {
            Ok(found) => found,
            Err(err) => {
                self.log(err.to_string());
                return;
            }
        };

        let spec = LaunchSpec::new(found.program, found.args, config);
        if config.debug_info {
            self.log(spec.command_line());
        }

        self.status = ServerStatus::Starting;
        let _ = self.event_tx.send(Event::ServerStarting);

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        command.current_dir(&self.work_dir);
        if !spec.env.is_empty() {
            command.envs(&spec.env);
        }
        // stdin is never used; both output streams are captured for relay.
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command.kill_on_drop(true);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
            command.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        #[cfg(unix)]
        unsafe {
            command.pre_exec(|| {
                let _ = libc::setpgid(0, 0);
                Ok(())
            });
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.status = ServerStatus::Idle;
                self.log(err.to_string());
                // `ServerStarting` already went out; the listener needs the
                // matching exit to leave its starting state.
                let _ = self.event_tx.send(Event::ServerExited { code: None });
                return;
            }
        };

        if let Some(stdout) = child.stdout.take() {
            let tx = self.event_tx.clone();
            tokio::spawn(relay_stdout(stdout, tx));
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = self.event_tx.clone();
            tokio::spawn(relay_stderr(stderr, tx));
        }

        // Bounded wait for startup confirmation: a child that is still
        // running once the grace window elapses counts as started.
        match tokio::time::timeout(STARTUP_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                self.status = ServerStatus::Idle;
                let code = status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".into());
                self.log(format!("server exited during startup ({})", code));
                let _ = self.event_tx.send(Event::ServerExited {
                    code: status.code(),
                });
            }
            Ok(Err(err)) => {
                self.status = ServerStatus::Idle;
                self.log(err.to_string());
                let _ = self.event_tx.send(Event::ServerExited { code: None });
            }
            Err(_) => {
                let pid = child.id().unwrap_or(0);
                self.child = Some(child);
                self.pid = Some(pid);
                self.status = ServerStatus::Running;
                let _ = self.event_tx.send(Event::ServerStarted { pid });
            }
        }
    }

    /// Forcibly closes any existing process, signals the listener to clear
    /// its log, then starts fresh. Valid from any state.
    pub async fn restart(&mut self, config: &Config) {
        self.terminate().await;
        let _ = self.event_tx.send(Event::LogClear);
        self.start(config).await;
    }

    /// Terminates the process if running. Must be invoked before application
    /// exit so no orphaned child survives.
    pub async fn close(&mut self) {
        self.terminate().await;
    }

    /// Detects a child that exited on its own. The exit code is reported,
    /// not interpreted, and no automatic restart happens; recovery is the
    /// user's explicit restart.
    pub fn poll_exit(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                self.child = None;
                self.pid = None;
                self.status = ServerStatus::Idle;
                let _ = self.event_tx.send(Event::ServerExited {
                    code: status.code(),
                });
            }
            Ok(None) => {}
            Err(err) => {
                self.child = None;
                self.pid = None;
                self.status = ServerStatus::Idle;
                self.log(err.to_string());
            }
        }
    }

    // OS-level termination, no graceful handshake with the child. The whole
    // process group is signalled first so an interpreter's own children go
    // down with it.
    async fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            self.status = ServerStatus::Stopping;
            if let Some(pid) = child.id() {
                send_kill_signal(pid);
            }
            let _ = child.kill().await;
        }
        self.pid = None;
        self.status = ServerStatus::Idle;
    }

    fn log(&self, line: String) {
        let _ = self.event_tx.send(Event::Log(line));
    }
}

#[cfg(unix)]
fn send_kill_signal(pid: u32) {
    unsafe {
        let pid = pid as i32;
        let _ = libc::kill(-pid, libc::SIGTERM);
    }
}

#[cfg(windows)]
fn send_kill_signal(pid: u32) {
    use windows_sys::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};
    unsafe {
        let _ = GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid);
    }
}

#[cfg(all(not(unix), not(windows)))]
fn send_kill_signal(_pid: u32) {}

// Server stdout is informational: relayed line by line into the log view.
async fn relay_stdout<R>(reader: R, tx: mpsc::UnboundedSender<Event>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let _ = tx.send(Event::Log(line));
    }
}

// Server stderr is an error surface: each chunk becomes a distinct event the
// UI raises as a blocking notification. The supervisor does not interpret or
// retry on its content.
async fn relay_stderr<R>(reader: R, tx: mpsc::UnboundedSender<Event>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let _ = tx.send(Event::ServerError { detail: line });
    }
}
