//! Terminal UI rendering.
//!
//! Handles raw-mode setup/teardown and draws the shell: a header with the
//! server status, the log view, a key-hint status bar, and the modal overlays
//! (server error dialog, help).

use std::io::{self, Stdout};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;

use crate::app::App;
use crate::output::sanitize_text;
use crate::supervisor::ServerStatus;

/// Type alias for the specific terminal backend used.
pub type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Accent palette selected by the config's theme name.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub accent: Color,
    pub dim: Color,
}

impl Theme {
    /// Resolves a theme name; unknown names fall back to the default accent.
    pub fn from_name(name: &str) -> Self {
        let accent = match name.to_lowercase().as_str() {
            "light" => Color::Blue,
            "green" => Color::Green,
            "magenta" => Color::Magenta,
            _ => Color::Cyan,
        };
        Self {
            accent,
            dim: Color::DarkGray,
        }
    }
}

/// Initializes the terminal for TUI mode.
pub fn init_terminal() -> io::Result<TuiTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restores the terminal to its original state.
pub fn restore_terminal(mut terminal: TuiTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Draws the current application state to the terminal.
pub fn draw(app: &mut App, terminal: &mut TuiTerminal, theme: Theme) -> io::Result<()> {
    execute!(terminal.backend_mut(), SetTitle("unblockr"))?;
    terminal.draw(|frame| {
        let area = frame.size();
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(1),
                Constraint::Length(3),
            ])
            .split(area);

        render_header(app, theme, frame, vertical[0]);
        render_log(app, theme, frame, vertical[1]);
        render_status_bar(app, theme, frame, vertical[2]);

        if let Some(detail) = app.error_detail.clone() {
            render_error_dialog(&detail, theme, frame, area);
        } else if app.show_help {
            render_help(theme, frame, area);
        }
    })?;
    Ok(())
}

fn render_header(app: &App, theme: Theme, frame: &mut ratatui::Frame, area: Rect) {
    let status_span = match app.status {
        ServerStatus::Idle => Span::styled("● idle", Style::default().fg(theme.dim)),
        ServerStatus::Starting => Span::styled("◌ starting", Style::default().fg(Color::Yellow)),
        ServerStatus::Running => Span::styled("● running", Style::default().fg(Color::Green)),
        ServerStatus::Stopping => Span::styled("◌ stopping", Style::default().fg(Color::Yellow)),
    };
    let mut spans = vec![
        Span::styled(
            "UnblockNeteaseMusic server ",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        status_span,
    ];
    if let Some(pid) = app.pid {
        spans.push(Span::styled(
            format!("  pid {}", pid),
            Style::default().fg(theme.dim),
        ));
    }
    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.accent)),
    );
    frame.render_widget(header, area);
}

fn render_log(app: &mut App, theme: Theme, frame: &mut ratatui::Frame, area: Rect) {
    let inner_height = area.height.saturating_sub(2) as usize;
    app.set_log_view_height(inner_height);

    let lines: Vec<Line> = app
        .logs
        .iter()
        .skip(app.scroll)
        .take(inner_height)
        .map(|raw| Line::from(sanitize_text(raw, app.strip_ansi)))
        .collect();

    let title = if app.follow { " log " } else { " log (scrolled) " };
    let log = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.dim))
            .title(title),
    );
    frame.render_widget(log, area);
}

fn render_status_bar(app: &App, theme: Theme, frame: &mut ratatui::Frame, area: Rect) {
    let line = match app.status_message() {
        Some(message) => Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(vec![
            Span::styled(app.status_line(), Style::default().fg(theme.dim)),
            Span::raw("   "),
            Span::styled(
                "r restart  c clear  e export  p proxy  s startup  ? help  q quit",
                Style::default().fg(theme.accent),
            ),
        ]),
    };
    let bar = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.dim)),
    );
    frame.render_widget(bar, area);
}

fn render_error_dialog(detail: &str, _theme: Theme, frame: &mut ratatui::Frame, area: Rect) {
    let popup = centered_rect(70, 50, area);
    frame.render_widget(Clear, popup);
    let mut lines = vec![
        Line::from(Span::styled(
            "The server ran into an error.",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from("Change the arguments or check port usage, then restart."),
        Line::from(""),
    ];
    for raw in detail.lines() {
        lines.push(Line::from(sanitize_text(raw, true)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Esc to dismiss",
        Style::default().fg(Color::DarkGray),
    )));
    let dialog = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Red))
            .title(" server error "),
    );
    frame.render_widget(dialog, popup);
}

fn render_help(theme: Theme, frame: &mut ratatui::Frame, area: Rect) {
    let popup = centered_rect(50, 60, area);
    frame.render_widget(Clear, popup);
    let entries = [
        ("r", "restart the server with the current config"),
        ("c", "clear the log view"),
        ("e", "export the log to a file"),
        ("f", "toggle follow"),
        ("a", "toggle ANSI stripping"),
        ("p", "toggle system proxy registration"),
        ("s", "toggle start-on-login"),
        ("↑/↓ PgUp/PgDn", "scroll"),
        ("q", "quit"),
    ];
    let lines: Vec<Line> = entries
        .iter()
        .map(|(keys, action)| {
            Line::from(vec![
                Span::styled(format!("{:<14}", keys), Style::default().fg(theme.accent)),
                Span::raw(*action),
            ])
        })
        .collect();
    let help = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.accent))
            .title(" keys "),
    );
    frame.render_widget(help, popup);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let theme = Theme::from_name("no-such-theme");
        assert!(matches!(theme.accent, Color::Cyan));
    }

    #[test]
    fn named_themes_resolve() {
        assert!(matches!(Theme::from_name("light").accent, Color::Blue));
        assert!(matches!(Theme::from_name("GREEN").accent, Color::Green));
    }

    #[test]
    fn centered_rect_stays_inside_area() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(70, 50, area);
        assert!(popup.x >= area.x && popup.right() <= area.right());
        assert!(popup.y >= area.y && popup.bottom() <= area.bottom());
    }
}
