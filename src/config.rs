//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--no-watcher`, `--debounce-ms`)
//! 2. `$EDSH_CONFIG` environment variable (path to config file)
//! 3. Project-local `.edsh.toml` in the current working directory
//! 4. Global `~/.config/edsh/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::fs::watcher::{
    WatchOptions, DEFAULT_DEBOUNCE_MS, DEFAULT_FLOOD_THRESHOLD, DEFAULT_IGNORE_PATTERNS,
};
use crate::notifications::DEFAULT_TTL_SECS;

// ── Section configs ──────────────────────────────────────────────────────────

/// General application settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Reopen the last directory and its tabs on startup.
    pub restore_session: Option<bool>,
    /// Show dotfiles in the explorer.
    pub show_hidden: Option<bool>,
}

/// Filesystem watcher settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WatcherConfig {
    /// Enable filesystem watcher for live reconciliation.
    pub enabled: Option<bool>,
    /// Debounce interval in milliseconds.
    pub debounce_ms: Option<u64>,
    /// Changes per debounce window above which a full rescan is requested.
    pub flood_threshold: Option<usize>,
    /// Directory names never watched.
    pub ignore_patterns: Option<Vec<String>>,
}

/// Editor buffer settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EditorConfig {
    /// Spaces inserted by the Tab key.
    pub tab_width: Option<usize>,
}

/// Toast settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Seconds a plain notification stays visible.
    pub ttl_secs: Option<u64>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub watcher: WatcherConfig,
    pub editor: EditorConfig,
    pub notifications: NotificationsConfig,
}

/// Default Tab key width in spaces.
pub const DEFAULT_TAB_WIDTH: usize = 4;

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// The CLI `--config` path is not included; `load` handles it separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("EDSH_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".edsh.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("edsh").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning logged).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config file");
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `Some` values in `other` win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                restore_session: other
                    .general
                    .restore_session
                    .or(self.general.restore_session),
                show_hidden: other.general.show_hidden.or(self.general.show_hidden),
            },
            watcher: WatcherConfig {
                enabled: other.watcher.enabled.or(self.watcher.enabled),
                debounce_ms: other.watcher.debounce_ms.or(self.watcher.debounce_ms),
                flood_threshold: other
                    .watcher
                    .flood_threshold
                    .or(self.watcher.flood_threshold),
                ignore_patterns: other
                    .watcher
                    .ignore_patterns
                    .clone()
                    .or(self.watcher.ignore_patterns),
            },
            editor: EditorConfig {
                tab_width: other.editor.tab_width.or(self.editor.tab_width),
            },
            notifications: NotificationsConfig {
                ttl_secs: other.notifications.ttl_secs.or(self.notifications.ttl_secs),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Walk in reverse so that highest-priority (env var) overwrites lower.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn restore_session(&self) -> bool {
        self.general.restore_session.unwrap_or(true)
    }

    pub fn show_hidden(&self) -> bool {
        self.general.show_hidden.unwrap_or(false)
    }

    pub fn watcher_enabled(&self) -> bool {
        self.watcher.enabled.unwrap_or(true)
    }

    /// Watcher debounce interval in milliseconds.
    pub fn debounce_ms(&self) -> u64 {
        self.watcher.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)
    }

    pub fn flood_threshold(&self) -> usize {
        self.watcher.flood_threshold.unwrap_or(DEFAULT_FLOOD_THRESHOLD)
    }

    pub fn ignore_patterns(&self) -> Vec<String> {
        self.watcher.ignore_patterns.clone().unwrap_or_else(|| {
            DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }

    /// Everything the watch manager needs, with defaults applied.
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            debounce: Duration::from_millis(self.debounce_ms()),
            ignore_patterns: self.ignore_patterns(),
            flood_threshold: self.flood_threshold(),
        }
    }

    pub fn tab_width(&self) -> usize {
        self.editor.tab_width.unwrap_or(DEFAULT_TAB_WIDTH).max(1)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notifications.ttl_secs.unwrap_or(DEFAULT_TTL_SECS))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
