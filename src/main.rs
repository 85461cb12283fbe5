//! unblockr: a terminal shell for the UnblockNeteaseMusic proxy server.
//!
//! This is the entry point of the application. It loads configuration,
//! overlays CLI overrides, starts the server through the supervisor, and runs
//! the event loop that relays server output into the TUI.

mod app;
mod config;
mod discover;
mod events;
mod launch;
mod output;
mod platform;
mod supervisor;
mod tui;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::Parser;
use tokio::sync::mpsc;

use crate::app::{App, AppAction};
use crate::config::Config;
use crate::events::Event;
use crate::platform::{PlatformServices, PlatformSupport};
use crate::supervisor::Supervisor;
use crate::tui::Theme;

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "unblockr",
    version,
    about = "Launcher and supervisor for the UnblockNeteaseMusic server",
    styles = help_styles(),
    color = clap::ColorChoice::Always,
    disable_help_subcommand = true
)]
struct Cli {
    /// Path to the unblockr.toml configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ignore any unblockr.toml in the working directory.
    #[arg(long)]
    no_config: bool,
    /// Directory to search for the server program (default: current dir).
    #[arg(long)]
    work_dir: Option<PathBuf>,
    /// Max log lines kept in memory.
    #[arg(long)]
    max_lines: Option<usize>,
    /// Disable the TUI and print server output to stdout.
    #[arg(long)]
    no_ui: bool,
    /// Server listen port (-p).
    #[arg(long)]
    port: Option<String>,
    /// Server bind address (-a).
    #[arg(long)]
    address: Option<String>,
    /// NetEase server URL override (-u).
    #[arg(long)]
    url: Option<String>,
    /// Force hostname resolution (-f).
    #[arg(long)]
    host: Option<String>,
    /// Music sources in priority order (-o); repeatable, entries may be
    /// comma-separated.
    #[arg(long = "source")]
    sources: Vec<String>,
    /// Enable strict mode (-s).
    #[arg(long)]
    strict: bool,
    /// Ask the server for debug logging and echo the spawned command line.
    #[arg(long)]
    debug: bool,
    /// Extra server argument entries, each split on whitespace; repeatable.
    #[arg(long, allow_hyphen_values = true)]
    other: Vec<String>,
    /// KEY=VALUE environment overrides for the server; repeatable.
    #[arg(long)]
    env: Vec<String>,
    /// UI theme name.
    #[arg(long)]
    theme: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let work_dir = match &cli.work_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("failed to resolve working directory")?,
    };

    let config_path = resolve_config_path(&cli, &work_dir);
    let mut config = match &config_path {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    apply_overrides(&cli, &mut config);

    let max_lines = cli.max_lines.unwrap_or(10_000);
    let theme = Theme::from_name(&config.theme);

    // Unbounded: the supervisor publishes while the loop below is still
    // awaiting `start`/`restart`, so sends must never wait on the consumer.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut supervisor = Supervisor::new(work_dir, event_tx.clone());
    let mut app = App::new(max_lines);
    let services = platform::services();
    let mut proxy_enabled = false;

    supervisor.start(&config).await;

    let mut terminal = if cli.no_ui {
        None
    } else {
        Some(tui::init_terminal()?)
    };

    if !cli.no_ui {
        spawn_input_listener(event_tx.clone());
    }
    spawn_signal_listener(event_tx.clone());

    let mut ticker = tokio::time::interval(Duration::from_millis(150));

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    Event::Log(line) => {
                        if cli.no_ui {
                            println!("{}", line);
                        }
                        app.on_log(line);
                    }
                    Event::LogClear => app.on_log_clear(),
                    Event::ServerStarting => {
                        app.on_starting();
                        app.set_status_message("Starting server");
                    }
                    Event::ServerStarted { pid } => {
                        app.on_started(pid);
                        app.set_status_message(format!("Server running (pid {})", pid));
                        if cli.no_ui {
                            println!("[unblockr] server started (pid {})", pid);
                        }
                    }
                    Event::ServerError { detail } => {
                        if cli.no_ui {
                            eprintln!("[unblockr] server error: {}", detail);
                        } else {
                            app.on_server_error(detail);
                        }
                    }
                    Event::ServerExited { code } => {
                        app.on_exited(code);
                        let message = match code {
                            Some(0) => "Server exited".to_string(),
                            Some(code) => format!("Server exited with code {}", code),
                            None => "Server exited".to_string(),
                        };
                        app.set_status_message(message.clone());
                        if cli.no_ui {
                            println!("[unblockr] {}", message.to_lowercase());
                        }
                    }
                    Event::Key(key) => {
                        let action = app.handle_key(key);
                        handle_app_action(
                            action,
                            &mut app,
                            &mut supervisor,
                            &mut config,
                            &services,
                            &mut proxy_enabled,
                        )
                        .await;
                    }
                    Event::Mouse(mouse) => {
                        let action = app.handle_mouse(mouse);
                        handle_app_action(
                            action,
                            &mut app,
                            &mut supervisor,
                            &mut config,
                            &services,
                            &mut proxy_enabled,
                        )
                        .await;
                    }
                    Event::Resize { .. } => {
                        if let Some(term) = terminal.as_mut() {
                            let _ = term.autoresize();
                        }
                    }
                    Event::Shutdown => {
                        app.should_quit = true;
                    }
                }
            }
            _ = ticker.tick() => {
                supervisor.poll_exit();
            }
        }

        if let Some(term) = terminal.as_mut() {
            tui::draw(&mut app, term, theme)?;
        }
        if app.should_quit {
            break;
        }
    }

    supervisor.close().await;
    if let Some(term) = terminal {
        tui::restore_terminal(term)?;
    }
    if let Some(path) = &config_path {
        if let Err(err) = config::save_config(path, &config) {
            eprintln!("[unblockr] {}", err);
        }
    }
    Ok(())
}

async fn handle_app_action(
    action: AppAction,
    app: &mut App,
    supervisor: &mut Supervisor,
    config: &mut Config,
    services: &impl PlatformServices,
    proxy_enabled: &mut bool,
) {
    match action {
        AppAction::Quit | AppAction::None => {}
        AppAction::Restart => {
            supervisor.restart(config).await;
        }
        AppAction::ClearLog => app.on_log_clear(),
        AppAction::Export => {
            if let Err(err) = app.export_logs() {
                app.set_status_message(format!("Export failed: {}", err));
            }
        }
        AppAction::ToggleProxy => {
            let enable = !*proxy_enabled;
            let address = default_if_empty(&config.address, "127.0.0.1");
            let port = default_if_empty(&config.port, "8080");
            match services.set_system_proxy(&address, &port, enable) {
                Ok(PlatformSupport::Applied) => {
                    *proxy_enabled = enable;
                    app.set_status_message(if enable {
                        format!("System proxy set to {}:{}", address, port)
                    } else {
                        "System proxy cleared".to_string()
                    });
                }
                Ok(PlatformSupport::Unsupported) => {
                    app.set_status_message("System proxy is not supported on this platform");
                }
                Err(err) => app.set_status_message(format!("System proxy failed: {}", err)),
            }
        }
        AppAction::ToggleStartup => {
            let enable = !config.startup;
            match services.set_login_startup(enable) {
                Ok(PlatformSupport::Applied) => {
                    config.startup = enable;
                    app.set_status_message(if enable {
                        "Will start on login"
                    } else {
                        "Removed from login startup"
                    });
                }
                Ok(PlatformSupport::Unsupported) => {
                    app.set_status_message("Start on login is not supported on this platform");
                }
                Err(err) => app.set_status_message(format!("Startup toggle failed: {}", err)),
            }
        }
    }
}

fn resolve_config_path(cli: &Cli, work_dir: &Path) -> Option<PathBuf> {
    if cli.no_config {
        return None;
    }
    if let Some(path) = &cli.config {
        return Some(path.clone());
    }
    let default = work_dir.join(config::DEFAULT_CONFIG_FILE);
    default.exists().then_some(default)
}

/// Overlays CLI flags onto the loaded configuration snapshot.
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(port) = &cli.port {
        config.port = port.clone();
    }
    if let Some(address) = &cli.address {
        config.address = address.clone();
    }
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if !cli.sources.is_empty() {
        config.sources = cli
            .sources
            .iter()
            .flat_map(|entry| config::parse_sources(entry))
            .collect();
    }
    if cli.strict {
        config.strict = true;
    }
    if cli.debug {
        config.debug_info = true;
    }
    config.other.extend(cli.other.iter().cloned());
    config.env.extend(cli.env.iter().cloned());
    if let Some(theme) = &cli.theme {
        config.theme = theme.clone();
    }
}

fn default_if_empty(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn spawn_input_listener(tx: mpsc::UnboundedSender<Event>) {
    std::thread::spawn(move || loop {
        if crossterm::event::poll(Duration::from_millis(100)).unwrap_or(false) {
            match crossterm::event::read() {
                Ok(crossterm::event::Event::Key(key)) => {
                    let _ = tx.send(Event::Key(key));
                }
                Ok(crossterm::event::Event::Mouse(mouse)) => {
                    let _ = tx.send(Event::Mouse(mouse));
                }
                Ok(crossterm::event::Event::Resize(width, height)) => {
                    let _ = tx.send(Event::Resize { width, height });
                }
                _ => {}
            }
        }
    });
}

fn spawn_signal_listener(tx: mpsc::UnboundedSender<Event>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(_) => return,
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    let _ = tx.send(Event::Shutdown);
                }
                _ = sigterm.recv() => {
                    let _ = tx.send(Event::Shutdown);
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            let _ = tx.send(Event::Shutdown);
        }
    });
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_from(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("unblockr").chain(args.iter().copied()))
    }

    #[test]
    fn overrides_replace_scalar_fields() {
        let cli = cli_from(&["--port", "9000", "--address", "0.0.0.0", "--strict"]);
        let mut config = Config::default();
        config.port = "8080".into();
        apply_overrides(&cli, &mut config);
        assert_eq!(config.port, "9000");
        assert_eq!(config.address, "0.0.0.0");
        assert!(config.strict);
    }

    #[test]
    fn source_entries_are_split_and_flattened() {
        let cli = cli_from(&["--source", "kuwo,bilibili", "--source", "kugou"]);
        let mut config = Config::default();
        config.sources = vec!["migu".into()];
        apply_overrides(&cli, &mut config);
        assert_eq!(config.sources, vec!["kuwo", "bilibili", "kugou"]);
    }

    #[test]
    fn other_and_env_are_appended_not_replaced() {
        let cli = cli_from(&["--other", "-e x", "--env", "A=1"]);
        let mut config = Config::default();
        config.other = vec!["-t".into()];
        config.env = vec!["B=2".into()];
        apply_overrides(&cli, &mut config);
        assert_eq!(config.other, vec!["-t", "-e x"]);
        assert_eq!(config.env, vec!["B=2", "A=1"]);
    }

    #[test]
    fn absent_flags_leave_config_untouched() {
        let cli = cli_from(&[]);
        let mut config = Config::default();
        config.port = "8080".into();
        config.strict = true;
        apply_overrides(&cli, &mut config);
        assert_eq!(config.port, "8080");
        assert!(config.strict);
    }

    #[test]
    fn default_if_empty_falls_back() {
        assert_eq!(default_if_empty("", "127.0.0.1"), "127.0.0.1");
        assert_eq!(default_if_empty("10.0.0.1", "127.0.0.1"), "10.0.0.1");
    }
}
