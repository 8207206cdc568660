//! Key/value settings persisted as one JSON document, plus the typed shapes
//! of the keys the workspace owns.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::fs::paths::{display_name, normalize_path};

pub const KEY_LAST_OPEN_DIRECTORY: &str = "lastOpenDirectory";
pub const KEY_TABS: &str = "tabs";
pub const KEY_RECENT_PROJECTS: &str = "recentProjects";

/// Most recent projects remembered.
pub const MAX_RECENT_PROJECTS: usize = 10;

/// Default settings file: `<config_dir>/edsh/settings.json`.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("edsh").join("settings.json"))
}

/// In-memory copy of the settings document and the file it came from.
#[derive(Debug, Default)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    values: BTreeMap<String, Value>,
}

impl SettingsStore {
    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load `path`. A missing file is an empty store; an unreadable or
    /// corrupt one is logged and treated as empty.
    pub fn load(path: &Path) -> Self {
        let values = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring corrupt settings file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read settings file");
                BTreeMap::new()
            }
        };
        Self {
            path: Some(path.to_path_buf()),
            values,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set a key in memory. `Value::Null` removes it.
    pub fn set(&mut self, key: &str, value: Value) {
        if value.is_null() {
            self.values.remove(key);
        } else {
            self.values.insert(key.to_string(), value);
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.values)?)
    }

    /// Write the document back to its file, if it has one.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// One entry of the recent-projects list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentProject {
    pub name: String,
    pub path: PathBuf,
    /// Unix seconds.
    pub last_opened: u64,
}

impl RecentProject {
    pub fn now(path: &Path) -> Self {
        let path = normalize_path(path);
        Self {
            name: display_name(&path),
            path,
            last_opened: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

/// Put `project` at the front, dropping any older entry for the same path and
/// anything past [`MAX_RECENT_PROJECTS`].
pub fn push_recent(list: &mut Vec<RecentProject>, project: RecentProject) {
    list.retain(|p| p.path != project.path);
    list.insert(0, project);
    list.truncate(MAX_RECENT_PROJECTS);
}
