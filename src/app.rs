//! Application state and input handling.
//!
//! `App` is the listener side of the supervisor's event interface: it mirrors
//! the server status, buffers log lines for display, and translates user
//! input into actions. It never talks to the supervisor directly; the event
//! loop in `main` applies the actions.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};

use crate::output::{sanitize_text, LogBuffer};
use crate::supervisor::ServerStatus;

const EXPORT_DIR: &str = "unblockr-logs";

/// The main application state container.
#[derive(Debug)]
pub struct App {
    /// Buffered server output for the log view.
    pub logs: LogBuffer,
    /// Mirror of the supervisor's lifecycle state, updated from events.
    pub status: ServerStatus,
    /// Pid of the running server, if any.
    pub pid: Option<u32>,
    /// When the current server instance started.
    pub started_at: Option<Instant>,
    /// Exit code of the last run, once it ended.
    pub exit_code: Option<i32>,
    /// Current scroll position in the log view.
    pub scroll: usize,
    /// Whether the log view follows new output.
    pub follow: bool,
    /// Whether to strip ANSI codes from the display.
    pub strip_ansi: bool,
    /// Height of the log view area, for scrolling calculations.
    pub log_view_height: usize,
    /// Whether the help overlay is shown.
    pub show_help: bool,
    /// Accumulated stderr detail awaiting dismissal, shown as a dialog.
    pub error_detail: Option<String>,
    /// Flag indicating the application should exit.
    pub should_quit: bool,
    status_message: Option<StatusMessage>,
}

/// Actions resulting from user interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// No action required.
    None,
    /// Exit the application.
    Quit,
    /// Restart the server with the current configuration.
    Restart,
    /// Clear the displayed log.
    ClearLog,
    /// Export the log buffer to a file.
    Export,
    /// Toggle the system HTTP proxy registration.
    ToggleProxy,
    /// Toggle start-on-login registration.
    ToggleStartup,
}

#[derive(Debug, Clone)]
struct StatusMessage {
    text: String,
    at: Instant,
    ttl: Duration,
}

impl App {
    /// Creates a new `App` holding up to `max_lines` of server output.
    pub fn new(max_lines: usize) -> Self {
        Self {
            logs: LogBuffer::new(max_lines),
            status: ServerStatus::Idle,
            pid: None,
            started_at: None,
            exit_code: None,
            scroll: 0,
            follow: true,
            strip_ansi: false,
            log_view_height: 0,
            show_help: false,
            error_detail: None,
            should_quit: false,
            status_message: None,
        }
    }

    pub fn on_log(&mut self, line: String) {
        let dropped = self.logs.push(line);
        if dropped && !self.follow && self.scroll > 0 {
            self.scroll -= 1;
        }
        if self.follow {
            self.ensure_follow();
        }
    }

    pub fn on_log_clear(&mut self) {
        self.logs.clear();
        self.scroll = 0;
        self.follow = true;
    }

    pub fn on_starting(&mut self) {
        self.status = ServerStatus::Starting;
        self.pid = None;
        self.exit_code = None;
    }

    pub fn on_started(&mut self, pid: u32) {
        self.status = ServerStatus::Running;
        self.pid = Some(pid);
        self.started_at = Some(Instant::now());
        self.exit_code = None;
    }

    pub fn on_exited(&mut self, code: Option<i32>) {
        self.status = ServerStatus::Idle;
        self.pid = None;
        self.started_at = None;
        self.exit_code = code;
    }

    /// Accumulates stderr detail; the dialog stays up until dismissed so a
    /// multi-line stack trace arrives as one notification.
    pub fn on_server_error(&mut self, detail: String) {
        match &mut self.error_detail {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(&detail);
            }
            None => self.error_detail = Some(detail),
        }
    }

    pub fn dismiss_error(&mut self) {
        self.error_detail = None;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AppAction {
        if self.error_detail.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                self.dismiss_error();
            }
            return AppAction::None;
        }
        if self.show_help {
            self.show_help = false;
            return AppAction::None;
        }
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                AppAction::Quit
            }
            KeyCode::Char('r') => AppAction::Restart,
            KeyCode::Char('c') => AppAction::ClearLog,
            KeyCode::Char('e') => AppAction::Export,
            KeyCode::Char('p') => AppAction::ToggleProxy,
            KeyCode::Char('s') => AppAction::ToggleStartup,
            KeyCode::Char('f') => {
                self.follow = !self.follow;
                if self.follow {
                    self.ensure_follow();
                }
                AppAction::None
            }
            KeyCode::Char('a') => {
                self.strip_ansi = !self.strip_ansi;
                AppAction::None
            }
            KeyCode::Char('?') => {
                self.show_help = true;
                AppAction::None
            }
            KeyCode::Up => {
                self.scroll_up(1);
                AppAction::None
            }
            KeyCode::Down => {
                self.scroll_down(1);
                AppAction::None
            }
            KeyCode::PageUp => {
                self.scroll_up(self.log_view_height.max(1));
                AppAction::None
            }
            KeyCode::PageDown => {
                self.scroll_down(self.log_view_height.max(1));
                AppAction::None
            }
            KeyCode::Home => {
                self.scroll = 0;
                self.follow = false;
                AppAction::None
            }
            KeyCode::End => {
                self.follow = true;
                self.ensure_follow();
                AppAction::None
            }
            _ => AppAction::None,
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> AppAction {
        match mouse.kind {
            MouseEventKind::ScrollDown => self.scroll_down(3),
            MouseEventKind::ScrollUp => self.scroll_up(3),
            _ => {}
        }
        AppAction::None
    }

    pub fn scroll_up(&mut self, amount: usize) {
        let view = self.log_view_height.max(1);
        let max_scroll = self.logs.len().saturating_sub(view);
        let current = if self.follow { max_scroll } else { self.scroll };
        self.scroll = current.saturating_sub(amount).min(max_scroll);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, amount: usize) {
        let view = self.log_view_height.max(1);
        let max_scroll = self.logs.len().saturating_sub(view);
        let current = if self.follow { max_scroll } else { self.scroll };
        let next = (current + amount).min(max_scroll);
        self.scroll = next;
        self.follow = next == max_scroll;
    }

    pub fn ensure_follow(&mut self) {
        let view = self.log_view_height.max(1);
        self.scroll = self.logs.len().saturating_sub(view);
    }

    pub fn set_log_view_height(&mut self, height: usize) {
        self.log_view_height = height;
        let max_scroll = self.logs.len().saturating_sub(height.max(1));
        if self.follow {
            self.scroll = max_scroll;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }
    }

    /// One-line summary for the status bar.
    pub fn status_line(&self) -> String {
        let status = match self.status {
            ServerStatus::Idle => match self.exit_code {
                Some(code) => format!("exited ({})", code),
                None => "idle".to_string(),
            },
            ServerStatus::Starting => "starting".to_string(),
            ServerStatus::Running => "running".to_string(),
            ServerStatus::Stopping => "stopping".to_string(),
        };
        let pid = self
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".into());
        let elapsed = self
            .started_at
            .map(|t| format_duration(t.elapsed()))
            .unwrap_or_else(|| "-".into());
        format!(
            "status: {} | pid: {} | lines: {} | uptime: {} | follow: {}",
            status,
            pid,
            self.logs.len(),
            elapsed,
            if self.follow { "on" } else { "off" },
        )
    }

    pub fn status_message(&self) -> Option<&str> {
        let message = self.status_message.as_ref()?;
        (message.at.elapsed() < message.ttl).then_some(message.text.as_str())
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(StatusMessage {
            text: message.into(),
            at: Instant::now(),
            ttl: Duration::from_secs(3),
        });
    }

    /// Writes the current log buffer to a timestamped file.
    pub fn export_logs(&mut self) -> Result<PathBuf> {
        let dir = PathBuf::from(EXPORT_DIR);
        fs::create_dir_all(&dir).context("failed to create export directory")?;
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let path = dir.join(format!("server-{}.log", epoch));
        let mut output = String::new();
        for line in self.logs.iter() {
            output.push_str(&sanitize_text(line, true));
            output.push('\n');
        }
        fs::write(&path, output).with_context(|| format!("failed to write {}", path.display()))?;
        self.set_status_message(format!("Exported log to {}", path.display()));
        Ok(path)
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let minutes = secs / 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}", minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn keys_map_to_actions() {
        let mut app = App::new(100);
        assert_eq!(app.handle_key(key(KeyCode::Char('r'))), AppAction::Restart);
        assert_eq!(app.handle_key(key(KeyCode::Char('c'))), AppAction::ClearLog);
        assert_eq!(app.handle_key(key(KeyCode::Char('e'))), AppAction::Export);
        assert_eq!(
            app.handle_key(key(KeyCode::Char('p'))),
            AppAction::ToggleProxy
        );
        assert_eq!(
            app.handle_key(key(KeyCode::Char('s'))),
            AppAction::ToggleStartup
        );
        assert_eq!(app.handle_key(key(KeyCode::Char('q'))), AppAction::Quit);
        assert!(app.should_quit);
    }

    #[test]
    fn error_dialog_swallows_keys_until_dismissed() {
        let mut app = App::new(100);
        app.on_server_error("boom".into());
        assert_eq!(app.handle_key(key(KeyCode::Char('r'))), AppAction::None);
        assert!(app.error_detail.is_some());
        app.handle_key(key(KeyCode::Esc));
        assert!(app.error_detail.is_none());
        assert_eq!(app.handle_key(key(KeyCode::Char('r'))), AppAction::Restart);
    }

    #[test]
    fn server_error_detail_accumulates() {
        let mut app = App::new(100);
        app.on_server_error("line one".into());
        app.on_server_error("line two".into());
        assert_eq!(app.error_detail.as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn log_clear_resets_scroll_and_follow() {
        let mut app = App::new(100);
        app.log_view_height = 2;
        for i in 0..10 {
            app.on_log(format!("line {}", i));
        }
        app.scroll_up(3);
        assert!(!app.follow);
        app.on_log_clear();
        assert!(app.logs.is_empty());
        assert_eq!(app.scroll, 0);
        assert!(app.follow);
    }

    #[test]
    fn scroll_down_to_bottom_resumes_follow() {
        let mut app = App::new(100);
        app.log_view_height = 2;
        for i in 0..6 {
            app.on_log(format!("line {}", i));
        }
        app.scroll_up(10);
        assert!(!app.follow);
        app.scroll_down(100);
        assert!(app.follow);
    }

    #[test]
    fn mouse_wheel_scrolls() {
        let mut app = App::new(100);
        app.log_view_height = 1;
        for i in 0..10 {
            app.on_log(format!("line {}", i));
        }
        let mouse = MouseEvent {
            kind: MouseEventKind::ScrollUp,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        };
        app.handle_mouse(mouse);
        assert!(!app.follow);
    }

    #[test]
    fn lifecycle_events_update_status_line() {
        let mut app = App::new(100);
        app.on_starting();
        assert!(app.status_line().contains("starting"));
        app.on_started(42);
        assert!(app.status_line().contains("running"));
        assert!(app.status_line().contains("42"));
        app.on_exited(Some(1));
        assert!(app.status_line().contains("exited (1)"));
        assert!(app.pid.is_none());
    }

    #[test]
    fn export_writes_sanitized_log() {
        let mut app = App::new(100);
        app.on_log("\u{1b}[31mred\u{1b}[0m".into());
        let path = app.export_logs().unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "red\n");
        fs::remove_file(&path).unwrap();
    }
}
