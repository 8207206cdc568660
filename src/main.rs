mod app;
mod components;
mod editor;
mod event;
mod handler;
mod tui;
mod ui;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use editor_shell::bridge::{HostBridge, LocalHostBridge};
use editor_shell::config::{AppConfig, GeneralConfig, WatcherConfig};
use editor_shell::error::{AppError, Result};
use editor_shell::settings::{default_settings_path, SettingsStore};
use editor_shell::workspace::{Workspace, WorkspaceOptions};

use crate::app::App;
use crate::event::{Event, EventHandler};
use crate::tui::{install_panic_hook, Tui};

/// A terminal code-editor shell with a live-synced file explorer.
#[derive(Parser, Debug)]
#[command(name = "edsh", version, about)]
struct Cli {
    /// Folder to open (defaults to the last one opened)
    path: Option<PathBuf>,

    /// Path to a config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable the filesystem watcher (no live reconciliation)
    #[arg(long)]
    no_watcher: bool,

    /// Watcher debounce window in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Start without restoring the previous session's tabs and folder
    #[arg(long)]
    no_restore: bool,

    /// Log file (defaults to <cache dir>/edsh/edsh.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                restore_session: self.no_restore.then_some(false),
                ..GeneralConfig::default()
            },
            watcher: WatcherConfig {
                enabled: self.no_watcher.then_some(false),
                debounce_ms: self.debounce_ms,
                ..WatcherConfig::default()
            },
            ..AppConfig::default()
        }
    }
}

/// Send tracing output to a file; the terminal belongs to the UI.
fn init_logging(path: Option<PathBuf>) -> Option<PathBuf> {
    let path = path.or_else(|| dirs::cache_dir().map(|d| d.join("edsh").join("edsh.log")))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok()?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(filter)
        .init();
    Some(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = match &cli.path {
        Some(path) => Some(path.canonicalize().map_err(|_| {
            AppError::InvalidPath(format!("{} does not exist", path.display()))
        })?),
        None => None,
    };

    let log_path = init_logging(cli.log_file.clone());
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));
    info!(log = ?log_path, watcher = config.watcher_enabled(), "starting edsh");

    let settings = match default_settings_path() {
        Some(path) => SettingsStore::load(&path),
        None => {
            warn!("no config directory; settings will not persist");
            SettingsStore::in_memory()
        }
    };
    let bridge = Arc::new(LocalHostBridge::new(config.watch_options(), settings));
    let (listener, changes) = bridge.on_file_changed();

    let mut workspace = Workspace::new(bridge.clone(), WorkspaceOptions::from_config(&config));
    if let Err(e) = workspace
        .restore_session(root.as_deref(), config.restore_session())
        .await
    {
        warn!(error = %e, "could not open the requested folder");
        workspace.notifications_mut().error(e.to_string());
    }

    install_panic_hook();

    let mut tui = Tui::new()?;
    let mut events = EventHandler::new(Duration::from_millis(16));
    events.forward_changes(changes);
    let mut app = App::new(workspace, config.tab_width(), events.sender());

    loop {
        tui.terminal_mut().draw(|frame| {
            ui::render(&mut app, frame);
        })?;

        match events.next().await? {
            Event::Key(key) => handler::handle_key_event(&mut app, key).await,
            Event::Tick => {
                app.tick(Instant::now()).await;
                continue;
            }
            Event::Resize(_, _) => {}
            Event::FsChange(change) => app.on_change(change),
            Event::FollowupDone(result) => app.on_followup_done(result),
        }
        app.sync();

        if app.should_quit {
            break;
        }
    }

    app.workspace.shutdown().await;
    bridge.remove_listener(listener);
    tui.restore()?;
    info!("exited");
    Ok(())
}
