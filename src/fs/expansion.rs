//! Which explorer folders are open, plus the "manually closed" memory that
//! keeps expand-to-active-file from fighting the user.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::fs::paths::{expand_ancestors_of, normalize_path};

/// Expansion state for the explorer tree.
///
/// All paths are stored normalized. `manually_closed` is only consulted by
/// [`ExpansionState::converge`]; manual toggles always win.
#[derive(Debug, Default, Clone)]
pub struct ExpansionState {
    expanded: HashSet<PathBuf>,
    manually_closed: HashSet<PathBuf>,
    /// File the convergence pass last ran for; a different file means "new tab".
    last_active: Option<PathBuf>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, path: &Path) -> bool {
        self.expanded.contains(&normalize_path(path))
    }

    pub fn is_manually_closed(&self, path: &Path) -> bool {
        self.manually_closed.contains(&normalize_path(path))
    }

    /// Expanded paths, parents before children.
    pub fn expanded_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.expanded.iter().cloned().collect();
        paths.sort_by(|a, b| {
            a.components()
                .count()
                .cmp(&b.components().count())
                .then_with(|| a.cmp(b))
        });
        paths
    }

    /// Flip a folder. Collapsing records it as manually closed; expanding
    /// clears that record. Returns the new expanded state.
    pub fn toggle(&mut self, path: &Path) -> bool {
        let path = normalize_path(path);
        if self.expanded.remove(&path) {
            self.manually_closed.insert(path);
            false
        } else {
            self.manually_closed.remove(&path);
            self.expanded.insert(path);
            true
        }
    }

    /// Mark a folder expanded without touching the manually-closed set.
    pub fn expand(&mut self, path: &Path) {
        self.expanded.insert(normalize_path(path));
    }

    /// Collapse everything and suppress auto-expansion of what was open,
    /// including every ancestor of the active file.
    pub fn close_all(&mut self, active_file: Option<&Path>, root: &Path) {
        self.manually_closed.extend(self.expanded.drain());
        if let Some(file) = active_file {
            self.manually_closed
                .extend(expand_ancestors_of(file, root));
        }
    }

    /// Drop all state for `path` and everything below it (the folder is gone).
    pub fn forget_under(&mut self, path: &Path) {
        let path = normalize_path(path);
        self.expanded.retain(|p| !p.starts_with(&path));
        self.manually_closed.retain(|p| !p.starts_with(&path));
    }

    /// Forget everything, including the last active file.
    pub fn reset(&mut self) {
        self.expanded.clear();
        self.manually_closed.clear();
        self.last_active = None;
    }

    /// Expand-to-active-file.
    ///
    /// When `active_file` differs from the previous call, the manually-closed
    /// set is cleared and every missing ancestor is opened. When it is the
    /// same file (a re-trigger after a refresh or a collapse), ancestors the
    /// user closed stay closed. Returns the folders this call opened, in
    /// root-to-leaf order.
    pub fn converge(&mut self, active_file: &Path, root: &Path) -> Vec<PathBuf> {
        let active_file = normalize_path(active_file);
        let is_new_tab = self.last_active.as_deref() != Some(active_file.as_path());
        if is_new_tab {
            self.manually_closed.clear();
        }

        let opened: Vec<PathBuf> = expand_ancestors_of(&active_file, root)
            .into_iter()
            .filter(|folder| {
                !self.expanded.contains(folder)
                    && (is_new_tab || !self.manually_closed.contains(folder))
            })
            .collect();

        self.expanded.extend(opened.iter().cloned());
        self.last_active = Some(active_file);
        opened
    }
}
