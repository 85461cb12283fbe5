//! Event definitions for the application event loop.
//!
//! This module defines the `Event` enum which encapsulates everything that
//! drives the shell's state transitions: supervisor notifications, user
//! input, and OS signals. The supervisor publishes into the channel without
//! knowing who is listening on the other end.

use crossterm::event::{KeyEvent, MouseEvent};

/// Represents an event in the application's main event loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// An informational line for the log view (server stdout or shell notice).
    Log(String),
    /// Request to clear the displayed log (emitted on restart).
    LogClear,
    /// The server process is about to be spawned.
    ServerStarting,
    /// The server process started and survived the startup grace window.
    ServerStarted { pid: u32 },
    /// The server wrote to standard error; surfaced as a blocking
    /// notification with the decoded text as detail, not as a log line.
    ServerError { detail: String },
    /// The server process exited. The code is reported but not interpreted.
    ServerExited { code: Option<i32> },
    /// A keyboard event received from the user.
    Key(KeyEvent),
    /// A mouse event received from the user.
    Mouse(MouseEvent),
    /// The terminal window was resized.
    Resize { width: u16, height: u16 },
    /// Ctrl-C / SIGTERM: shut the server down and exit.
    Shutdown,
}
