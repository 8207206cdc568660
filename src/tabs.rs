//! Open editor buffers and their sync state with disk.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::fs::paths::{display_name, normalize_path};
use crate::language::detect_language;

/// Stable identifier of an open tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One open buffer.
///
/// `modified` is always `content != original_content || deleted_on_disk`;
/// it is re-derived by every operation that touches either side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub name: String,
    /// `None` for an untitled buffer that has never been saved.
    pub path: Option<PathBuf>,
    pub content: String,
    pub original_content: String,
    pub language: String,
    #[serde(default)]
    pub language_override: Option<String>,
    pub active: bool,
    pub modified: bool,
    pub externally_modified: bool,
    /// The backing file was removed while the tab was open.
    #[serde(default)]
    pub deleted_on_disk: bool,
}

impl Tab {
    fn recompute_modified(&mut self) {
        self.modified = self.content != self.original_content || self.deleted_on_disk;
    }

    /// Both the buffer and the disk changed since the last sync.
    pub fn is_conflicting(&self) -> bool {
        self.modified && self.externally_modified
    }

    fn redetect_language(&mut self) {
        self.language = match &self.language_override {
            Some(lang) => lang.clone(),
            None => detect_language(&self.name).to_string(),
        };
    }
}

/// Ordered list of open tabs, at most one per path, at most one active.
#[derive(Debug, Default)]
pub struct TabManager {
    tabs: Vec<Tab>,
    /// Position of each tab in `tabs`, rebuilt whenever the order changes.
    index: HashMap<TabId, usize>,
    next_id: u64,
    untitled_counter: u32,
}

impl TabManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.index.get(&id).map(|&i| &self.tabs[i])
    }

    fn get_mut(&mut self, id: TabId) -> Result<&mut Tab> {
        match self.index.get(&id) {
            Some(&i) => Ok(&mut self.tabs[i]),
            None => Err(AppError::TabNotFound(id)),
        }
    }

    pub fn position(&self, id: TabId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn active(&self) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.active)
    }

    pub fn active_id(&self) -> Option<TabId> {
        self.active().map(|t| t.id)
    }

    /// Tab whose backing file is `path`.
    pub fn find_by_path(&self, path: &Path) -> Option<&Tab> {
        let path = normalize_path(path);
        self.tabs.iter().find(|t| t.path.as_deref() == Some(path.as_path()))
    }

    fn allocate_id(&mut self) -> TabId {
        self.next_id += 1;
        TabId(self.next_id)
    }

    fn reindex(&mut self) {
        self.index = self
            .tabs
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id, i))
            .collect();
    }

    fn push_active(&mut self, tab: Tab) -> TabId {
        let id = tab.id;
        for t in &mut self.tabs {
            t.active = false;
        }
        self.index.insert(id, self.tabs.len());
        self.tabs.push(tab);
        id
    }

    /// Open `path` with freshly read `content`. If the path is already open the
    /// existing tab is activated and its buffer left alone.
    pub fn open(&mut self, path: &Path, content: String) -> TabId {
        if let Some(id) = self.find_by_path(path).map(|t| t.id) {
            self.activate(id);
            return id;
        }
        let path = normalize_path(path);
        let name = display_name(&path);
        let id = self.allocate_id();
        self.push_active(Tab {
            id,
            language: detect_language(&name).to_string(),
            name,
            path: Some(path),
            original_content: content.clone(),
            content,
            language_override: None,
            active: true,
            modified: false,
            externally_modified: false,
            deleted_on_disk: false,
        })
    }

    /// Open an empty buffer with no backing file.
    pub fn open_untitled(&mut self) -> TabId {
        self.untitled_counter += 1;
        let id = self.allocate_id();
        self.push_active(Tab {
            id,
            name: format!("Untitled-{}", self.untitled_counter),
            path: None,
            content: String::new(),
            original_content: String::new(),
            language: crate::language::PLAINTEXT.to_string(),
            language_override: None,
            active: true,
            modified: false,
            externally_modified: false,
            deleted_on_disk: false,
        })
    }

    /// Replace the buffer text. Called on every edit.
    pub fn update_content(&mut self, id: TabId, content: String) -> Result<()> {
        let tab = self.get_mut(id)?;
        tab.content = content;
        tab.recompute_modified();
        Ok(())
    }

    /// Record a completed write of the current buffer, optionally to a new path.
    pub fn mark_saved(&mut self, id: TabId, path: &Path) -> Result<()> {
        let path = normalize_path(path);
        let tab = self.get_mut(id)?;
        if tab.path.as_deref() != Some(path.as_path()) {
            tab.name = display_name(&path);
            tab.path = Some(path);
            tab.redetect_language();
        }
        tab.original_content = tab.content.clone();
        tab.externally_modified = false;
        tab.deleted_on_disk = false;
        tab.recompute_modified();
        Ok(())
    }

    /// Discard the buffer in favour of `fresh` disk content.
    pub fn reload(&mut self, id: TabId, fresh: String) -> Result<()> {
        let tab = self.get_mut(id)?;
        tab.original_content = fresh.clone();
        tab.content = fresh;
        tab.externally_modified = false;
        tab.deleted_on_disk = false;
        tab.recompute_modified();
        Ok(())
    }

    /// The file behind a tab now differs from what the tab last synced.
    pub fn flag_external_change(&mut self, id: TabId) -> Result<()> {
        let tab = self.get_mut(id)?;
        tab.externally_modified = true;
        tab.deleted_on_disk = false;
        tab.recompute_modified();
        Ok(())
    }

    /// The file behind a tab was removed. The buffer is kept and counts as
    /// modified until it is saved again or closed.
    pub fn flag_deleted(&mut self, id: TabId) -> Result<()> {
        let tab = self.get_mut(id)?;
        tab.externally_modified = true;
        tab.deleted_on_disk = true;
        tab.recompute_modified();
        Ok(())
    }

    /// A deleted file reappeared with exactly the content the tab last synced.
    pub fn mark_present(&mut self, id: TabId) -> Result<()> {
        let tab = self.get_mut(id)?;
        tab.deleted_on_disk = false;
        tab.externally_modified = false;
        tab.recompute_modified();
        Ok(())
    }

    /// Paths of every tab backed by a file strictly under `dir`.
    pub fn paths_under(&self, dir: &Path) -> Vec<PathBuf> {
        let dir = normalize_path(dir);
        self.tabs
            .iter()
            .filter_map(|t| t.path.as_ref())
            .filter(|p| p.starts_with(&dir) && **p != dir)
            .cloned()
            .collect()
    }

    /// Make `id` the single active tab.
    pub fn activate(&mut self, id: TabId) -> bool {
        if !self.index.contains_key(&id) {
            return false;
        }
        for t in &mut self.tabs {
            t.active = t.id == id;
        }
        true
    }

    /// Activate the tab before/after the active one, wrapping around.
    pub fn activate_relative(&mut self, forward: bool) -> Option<TabId> {
        if self.tabs.is_empty() {
            return None;
        }
        let current = self
            .active_id()
            .and_then(|id| self.position(id))
            .unwrap_or(0);
        let len = self.tabs.len();
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        let id = self.tabs[next].id;
        self.activate(id);
        Some(id)
    }

    /// Remove a tab unconditionally. If it was active, the tab now at the same
    /// index (clamped to the new length) becomes active.
    pub fn remove(&mut self, id: TabId) -> Option<Tab> {
        let pos = self.position(id)?;
        let removed = self.tabs.remove(pos);
        self.reindex();
        if removed.active && !self.tabs.is_empty() {
            let next = pos.min(self.tabs.len() - 1);
            self.tabs[next].active = true;
        }
        Some(removed)
    }

    /// Set or clear (`"auto"`) the language override.
    pub fn set_language(&mut self, id: TabId, language: &str) -> Result<()> {
        let tab = self.get_mut(id)?;
        tab.language_override = match language {
            "auto" => None,
            lang => Some(lang.to_string()),
        };
        tab.redetect_language();
        Ok(())
    }

    /// Replace all tabs with a persisted list.
    ///
    /// Paths are normalized, later tabs repeating an id or path are dropped,
    /// `modified` is re-derived and exactly one tab ends up active (the first,
    /// if none was).
    pub fn restore(&mut self, persisted: Vec<Tab>) {
        self.tabs.clear();
        for mut tab in persisted {
            if self.tabs.iter().any(|t| t.id == tab.id) {
                continue;
            }
            tab.path = tab.path.as_deref().map(normalize_path);
            if let Some(path) = &tab.path {
                if self.tabs.iter().any(|t| t.path.as_ref() == Some(path)) {
                    continue;
                }
            }
            tab.recompute_modified();
            self.tabs.push(tab);
        }

        let mut seen_active = false;
        for tab in &mut self.tabs {
            tab.active = tab.active && !seen_active;
            seen_active |= tab.active;
        }
        if !seen_active {
            if let Some(first) = self.tabs.first_mut() {
                first.active = true;
            }
        }

        self.next_id = self.tabs.iter().map(|t| t.id.0).max().unwrap_or(0);
        self.untitled_counter = self
            .tabs
            .iter()
            .filter_map(|t| t.name.strip_prefix("Untitled-")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        self.reindex();
    }
}
