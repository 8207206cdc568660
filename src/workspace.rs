//! Ties the explorer tree, expansion state, open tabs and host bridge together
//! and reconciles them with change events from the watcher.
//!
//! State transitions are synchronous. Anything that needs I/O is described as
//! a [`Followup`], executed with [`perform`] (possibly on another task) and
//! fed back through [`Workspace::complete`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bridge::HostBridge;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::fs::expansion::ExpansionState;
use crate::fs::operations::DirEntry;
use crate::fs::paths::{display_name, is_within, normalize_path, parent_dir};
use crate::fs::tree::{DirectoryTree, RefreshApplied, RefreshTicket, VisibleRow};
use crate::fs::watcher::{ChangeEvent, ChangeKind};
use crate::notifications::{NotificationAction, NotificationCenter, NotificationLevel};
use crate::settings::{
    push_recent, RecentProject, KEY_LAST_OPEN_DIRECTORY, KEY_RECENT_PROJECTS, KEY_TABS,
};
use crate::tabs::{Tab, TabId, TabManager};

/// I/O the workspace wants done before it can finish reacting to something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Followup {
    /// Re-read a directory. `silent` refreshes never raise notifications.
    Refresh { ticket: RefreshTicket, silent: bool },
    /// Read an open file to compare it with what the tab last synced.
    /// `epoch` is the tab's sync epoch when the read was queued.
    RecheckTab { id: TabId, path: PathBuf, epoch: u64 },
}

/// Outcome of a [`Followup`].
#[derive(Debug)]
pub enum FollowupResult {
    Refreshed {
        ticket: RefreshTicket,
        silent: bool,
        result: Result<Vec<DirEntry>>,
    },
    DiskContent {
        id: TabId,
        path: PathBuf,
        epoch: u64,
        content: Result<String>,
    },
}

/// Execute a followup against the bridge. Owns its inputs so it can run on a
/// spawned task.
pub async fn perform(bridge: Arc<dyn HostBridge>, followup: Followup) -> FollowupResult {
    match followup {
        Followup::Refresh { ticket, silent } => {
            let result = bridge
                .refresh_directory(&ticket.path)
                .await
                .into_result(&ticket.path);
            FollowupResult::Refreshed {
                ticket,
                silent,
                result,
            }
        }
        Followup::RecheckTab { id, path, epoch } => {
            let content = bridge.read_file(&path).await;
            FollowupResult::DiskContent {
                id,
                path,
                epoch,
                content,
            }
        }
    }
}

/// Result of a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// The file changed on disk since the tab last synced; saving again with
    /// `confirm_overwrite` will replace it.
    NeedsOverwriteConfirmation,
}

/// How to close a tab with unsaved changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseResolution {
    Save,
    Discard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// The tab is modified; ask the user to save, discard or cancel.
    NeedsDecision,
}

#[derive(Debug, Clone)]
pub struct WorkspaceOptions {
    pub watcher_enabled: bool,
    pub show_hidden: bool,
    pub notification_ttl: Duration,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl WorkspaceOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            watcher_enabled: config.watcher_enabled(),
            show_hidden: config.show_hidden(),
            notification_ttl: config.notification_ttl(),
        }
    }
}

pub struct Workspace {
    bridge: Arc<dyn HostBridge>,
    options: WorkspaceOptions,
    tree: Option<DirectoryTree>,
    expansion: ExpansionState,
    tabs: TabManager,
    notifications: NotificationCenter,
    recent: Vec<RecentProject>,
    /// Bumped every time the root is opened or closed.
    generation: u64,
    /// Directories with a load in flight, so convergence does not queue twins.
    loading: HashSet<PathBuf>,
    /// Per tab, bumped whenever its synced content changes so rechecks read
    /// before a save or reload are dropped.
    sync_epochs: HashMap<TabId, u64>,
    watching: bool,
}

impl Workspace {
    pub fn new(bridge: Arc<dyn HostBridge>, options: WorkspaceOptions) -> Self {
        Self {
            bridge,
            notifications: NotificationCenter::new(options.notification_ttl),
            options,
            tree: None,
            expansion: ExpansionState::new(),
            tabs: TabManager::new(),
            recent: Vec::new(),
            generation: 0,
            loading: HashSet::new(),
            sync_epochs: HashMap::new(),
            watching: false,
        }
    }

    pub fn bridge(&self) -> Arc<dyn HostBridge> {
        Arc::clone(&self.bridge)
    }

    pub fn tree(&self) -> Option<&DirectoryTree> {
        self.tree.as_ref()
    }

    pub fn root(&self) -> Option<&Path> {
        self.tree.as_ref().map(|t| t.root_path())
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationCenter {
        &mut self.notifications
    }

    pub fn recent_projects(&self) -> &[RecentProject] {
        &self.recent
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    pub fn show_hidden(&self) -> bool {
        self.options.show_hidden
    }

    pub fn toggle_hidden(&mut self) {
        self.options.show_hidden = !self.options.show_hidden;
    }

    /// Explorer rows in display order; empty when no directory is open.
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        self.tree
            .as_ref()
            .map(|t| t.visible_rows(&self.expansion, self.options.show_hidden))
            .unwrap_or_default()
    }

    // ── Followup plumbing ───────────────────────────────────────────────────

    fn refresh_followup(&mut self, dir: &Path, silent: bool) -> Option<Followup> {
        let ticket = self.tree.as_mut()?.begin_refresh(dir);
        self.loading.insert(ticket.path.clone());
        Some(Followup::Refresh { ticket, silent })
    }

    /// Run followups until nothing is left, feeding each result back in.
    pub async fn run_followups(&mut self, followups: Vec<Followup>) {
        let mut queue: VecDeque<Followup> = followups.into();
        while let Some(followup) = queue.pop_front() {
            let result = perform(self.bridge(), followup).await;
            queue.extend(self.complete(result));
        }
    }

    /// Apply a finished followup and return whatever it made necessary.
    pub fn complete(&mut self, result: FollowupResult) -> Vec<Followup> {
        match result {
            FollowupResult::Refreshed {
                ticket,
                silent,
                result,
            } => self.complete_refresh(ticket, silent, result),
            FollowupResult::DiskContent {
                id,
                path,
                epoch,
                content,
            } => {
                if epoch == self.sync_epoch(id) {
                    self.complete_recheck(id, &path, content);
                } else {
                    debug!(tab = %id, "dropping recheck read before last sync");
                }
                Vec::new()
            }
        }
    }

    fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        silent: bool,
        result: Result<Vec<DirEntry>>,
    ) -> Vec<Followup> {
        let Some(tree) = self.tree.as_mut() else {
            debug!(path = %ticket.path.display(), "refresh finished with no open directory");
            return Vec::new();
        };
        if ticket.generation == tree.generation() {
            self.loading.remove(&ticket.path);
        }
        let path = ticket.path.clone();
        match tree.complete_refresh(ticket, result) {
            RefreshApplied::Applied => {
                let mut followups = self.converge(false);
                followups.extend(self.pending_loads());
                followups
            }
            RefreshApplied::Failed(reason) => {
                if !silent {
                    self.notifications.error(format!(
                        "Could not read {}: {}",
                        display_name(&path),
                        reason
                    ));
                }
                Vec::new()
            }
            RefreshApplied::NotLoaded
            | RefreshApplied::Superseded
            | RefreshApplied::StaleRoot => Vec::new(),
        }
    }

    fn sync_epoch(&self, id: TabId) -> u64 {
        self.sync_epochs.get(&id).copied().unwrap_or(0)
    }

    fn bump_sync_epoch(&mut self, id: TabId) {
        *self.sync_epochs.entry(id).or_insert(0) += 1;
    }

    fn recheck(&self, id: TabId, path: PathBuf) -> Followup {
        Followup::RecheckTab {
            id,
            path,
            epoch: self.sync_epoch(id),
        }
    }

    fn complete_recheck(&mut self, id: TabId, path: &Path, content: Result<String>) {
        let Some(tab) = self.tabs.get(id) else {
            return;
        };
        if tab.path.as_deref() != Some(path) {
            return;
        }
        match content {
            Ok(disk) if disk == tab.original_content => {
                if tab.deleted_on_disk {
                    info!(path = %path.display(), "file restored on disk");
                    let _ = self.tabs.mark_present(id);
                    self.bump_sync_epoch(id);
                    self.notifications.dismiss_for_tab(id);
                }
            }
            Ok(_) => self.flag_changed(id),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "open file unreadable");
                if !tab.deleted_on_disk {
                    self.flag_deleted(id);
                }
            }
        }
    }

    fn flag_changed(&mut self, id: TabId) {
        if self.tabs.flag_external_change(id).is_err() {
            return;
        }
        let name = self.tab_name(id);
        info!(tab = %id, name = %name, "external change flagged");
        self.notifications.dismiss_for_tab(id);
        self.notifications.push(
            NotificationLevel::Warning,
            format!("{name} changed on disk"),
            Some(NotificationAction::ReloadTab(id)),
        );
    }

    fn flag_deleted(&mut self, id: TabId) {
        if self.tabs.flag_deleted(id).is_err() {
            return;
        }
        let name = self.tab_name(id);
        info!(tab = %id, name = %name, "open file deleted on disk");
        self.notifications.dismiss_for_tab(id);
        self.notifications.push(
            NotificationLevel::Warning,
            format!("{name} was deleted from disk"),
            Some(NotificationAction::CloseTab(id)),
        );
    }

    fn tab_name(&self, id: TabId) -> String {
        self.tabs
            .get(id)
            .map(|t| t.name.clone())
            .unwrap_or_default()
    }

    /// Expand-to-active-file. `new_tab` is decided by the expansion tracker;
    /// the flag here only controls whether loads are scheduled right away.
    fn converge(&mut self, schedule_loads: bool) -> Vec<Followup> {
        let Some(root) = self.root().map(Path::to_path_buf) else {
            return Vec::new();
        };
        let Some(active) = self.tabs.active().and_then(|t| t.path.clone()) else {
            return Vec::new();
        };
        if !is_within(&active, &root) {
            return Vec::new();
        }
        let opened = self.expansion.converge(&active, &root);
        if !opened.is_empty() {
            debug!(count = opened.len(), file = %active.display(), "expanded to active file");
        }
        if schedule_loads {
            self.pending_loads()
        } else {
            Vec::new()
        }
    }

    /// Loads for every expanded folder that is in the tree but not yet listed.
    fn pending_loads(&mut self) -> Vec<Followup> {
        let wanted: Vec<PathBuf> = match &self.tree {
            Some(tree) => self
                .expansion
                .expanded_paths()
                .into_iter()
                .filter(|p| !self.loading.contains(p))
                .filter(|p| tree.find(p).is_some_and(|n| n.is_dir && !n.is_loaded()))
                .collect(),
            None => return Vec::new(),
        };
        wanted
            .iter()
            .filter_map(|p| self.refresh_followup(p, true))
            .collect()
    }

    // ── Reconciliation ──────────────────────────────────────────────────────

    /// React to one change event. Returns the I/O needed to finish.
    pub fn handle_change(&mut self, event: &ChangeEvent) -> Vec<Followup> {
        let Some(root) = self.root().map(Path::to_path_buf) else {
            return Vec::new();
        };
        let path = normalize_path(&event.path);
        if !is_within(&path, &root) {
            debug!(path = %path.display(), "ignoring change outside the open root");
            return Vec::new();
        }
        debug!(kind = event.kind.as_str(), path = %path.display(), "reconciling change");

        if event.kind == ChangeKind::Rescan {
            return self.rescan_followups(&root);
        }

        let mut followups = Vec::new();
        let parent = parent_dir(&path);
        if self.tree.as_ref().is_some_and(|t| t.is_loaded(&parent)) {
            followups.extend(self.refresh_followup(&parent, true));
        }

        match event.kind {
            ChangeKind::Add | ChangeKind::Change => {
                if let Some(id) = self.tabs.find_by_path(&path).map(|t| t.id) {
                    followups.push(self.recheck(id, path));
                }
            }
            ChangeKind::Unlink => {
                if let Some(id) = self.tabs.find_by_path(&path).map(|t| t.id) {
                    self.flag_deleted(id);
                }
            }
            ChangeKind::UnlinkDir => {
                self.expansion.forget_under(&path);
                for file in self.tabs.paths_under(&path) {
                    if let Some(id) = self.tabs.find_by_path(&file).map(|t| t.id) {
                        self.flag_deleted(id);
                    }
                }
            }
            ChangeKind::AddDir | ChangeKind::Rescan => {}
        }
        followups
    }

    fn rescan_followups(&mut self, root: &Path) -> Vec<Followup> {
        info!(root = %root.display(), "rescanning after change flood");
        let dirs = self
            .tree
            .as_ref()
            .map(|t| t.loaded_directories())
            .unwrap_or_default();
        let mut followups: Vec<Followup> = dirs
            .iter()
            .filter_map(|d| self.refresh_followup(d, true))
            .collect();
        followups.extend(self.tabs.tabs().iter().filter_map(|t| {
            let path = t.path.clone()?;
            is_within(&path, root).then(|| self.recheck(t.id, path))
        }));
        followups
    }

    /// Handle a change event and finish all resulting I/O before returning.
    pub async fn apply_change(&mut self, event: &ChangeEvent) {
        let followups = self.handle_change(event);
        self.run_followups(followups).await;
    }

    // ── Directory lifecycle ─────────────────────────────────────────────────

    /// Open `path` as the root, replacing any previous root and its watch session.
    pub async fn open_directory(&mut self, path: &Path) -> Result<()> {
        let path = normalize_path(path);
        if !self.bridge.directory_exists(&path).await {
            return Err(AppError::InvalidPath(format!(
                "Not a directory: {}",
                path.display()
            )));
        }

        self.bridge.stop_watch().await;
        self.generation += 1;
        self.tree = Some(DirectoryTree::new(&path, self.generation));
        self.expansion.reset();
        self.loading.clear();
        info!(root = %path.display(), generation = self.generation, "opening directory");

        let load = self.refresh_followup(&path, false);
        self.run_followups(load.into_iter().collect()).await;
        if !self.tree.as_ref().is_some_and(|t| t.is_loaded(&path)) {
            self.tree = None;
            return Err(AppError::DirectoryUnreadable {
                path,
                reason: "initial listing failed".to_string(),
            });
        }

        self.watching = false;
        if self.options.watcher_enabled {
            self.watching = self.bridge.start_or_restart_watch(&path).await;
            if !self.watching {
                self.notifications.push(
                    NotificationLevel::Warning,
                    "File watcher could not start; changes on disk will not show up",
                    Some(NotificationAction::RestartWatch),
                );
            }
        }

        push_recent(&mut self.recent, RecentProject::now(&path));
        self.persist_recent().await;
        self.set_setting(KEY_LAST_OPEN_DIRECTORY, Value::String(path.display().to_string()))
            .await;

        let followups = self.converge(true);
        self.run_followups(followups).await;
        Ok(())
    }

    /// Close the root: stop watching and forget the tree. Tabs stay open.
    pub async fn close_directory(&mut self) {
        self.bridge.stop_watch().await;
        self.generation += 1;
        self.tree = None;
        self.expansion.reset();
        self.loading.clear();
        self.watching = false;
        self.set_setting(KEY_LAST_OPEN_DIRECTORY, Value::Null).await;
        info!("directory closed");
    }

    /// Expand or collapse a folder, loading it on first expand.
    pub async fn toggle_folder(&mut self, path: &Path) {
        let expanded = self.expansion.toggle(path);
        if !expanded {
            return;
        }
        let path = normalize_path(path);
        if self.tree.as_ref().is_some_and(|t| !t.is_loaded(&path)) && !self.loading.contains(&path) {
            let load = self.refresh_followup(&path, false);
            self.run_followups(load.into_iter().collect()).await;
        }
    }

    /// Collapse every folder and keep the active file's ancestors closed.
    pub fn close_all_folders(&mut self) {
        let Some(root) = self.root().map(Path::to_path_buf) else {
            return;
        };
        let active = self.tabs.active().and_then(|t| t.path.clone());
        self.expansion.close_all(active.as_deref(), &root);
    }

    /// User-initiated refresh of one directory.
    pub async fn refresh_directory(&mut self, path: &Path) {
        let load = self.refresh_followup(path, false);
        self.run_followups(load.into_iter().collect()).await;
    }

    /// User-initiated refresh of everything loaded.
    pub async fn refresh_all(&mut self) {
        let dirs = self
            .tree
            .as_ref()
            .map(|t| t.loaded_directories())
            .unwrap_or_default();
        let followups = dirs
            .iter()
            .filter_map(|d| self.refresh_followup(d, false))
            .collect();
        self.run_followups(followups).await;
    }

    // ── Watch health ────────────────────────────────────────────────────────

    /// Poll the bridge for watch status; raise a notification when a live
    /// session has stopped.
    pub async fn check_watch(&mut self) -> bool {
        if self.tree.is_none() || !self.options.watcher_enabled {
            self.watching = false;
            return false;
        }
        let live = self.bridge.watch_status().await;
        if self.watching && !live {
            warn!("watch session is no longer active");
            self.notifications.push(
                NotificationLevel::Warning,
                "File watcher stopped",
                Some(NotificationAction::RestartWatch),
            );
        }
        self.watching = live;
        live
    }

    /// Re-establish the watch session on the current root.
    pub async fn restart_watch(&mut self) -> bool {
        let Some(root) = self.root().map(Path::to_path_buf) else {
            return false;
        };
        self.watching = self.bridge.start_or_restart_watch(&root).await;
        if self.watching {
            self.notifications.info("File watcher restarted");
            let dirs = self
                .tree
                .as_ref()
                .map(|t| t.loaded_directories())
                .unwrap_or_default();
            let followups = dirs
                .iter()
                .filter_map(|d| self.refresh_followup(d, true))
                .collect();
            self.run_followups(followups).await;
        } else {
            self.notifications.push(
                NotificationLevel::Error,
                format!("Could not watch {}", root.display()),
                Some(NotificationAction::RestartWatch),
            );
        }
        self.watching
    }

    // ── Tabs ────────────────────────────────────────────────────────────────

    /// Open a file in a tab (or focus its existing tab).
    pub async fn open_file(&mut self, path: &Path) -> Result<TabId> {
        let path = normalize_path(path);
        if let Some(id) = self.tabs.find_by_path(&path).map(|t| t.id) {
            self.activate_tab(id).await;
            return Ok(id);
        }
        let content = match self.bridge.read_file(&path).await {
            Ok(content) => content,
            Err(e) => {
                self.notifications.error(e.to_string());
                return Err(e);
            }
        };
        let id = self.tabs.open(&path, content);
        self.persist_tabs().await;
        let followups = self.converge(true);
        self.run_followups(followups).await;
        Ok(id)
    }

    pub async fn new_untitled(&mut self) -> TabId {
        let id = self.tabs.open_untitled();
        self.persist_tabs().await;
        id
    }

    pub async fn activate_tab(&mut self, id: TabId) {
        if self.tabs.active_id() == Some(id) || !self.tabs.activate(id) {
            return;
        }
        self.persist_tabs().await;
        let followups = self.converge(true);
        self.run_followups(followups).await;
    }

    pub async fn cycle_tab(&mut self, forward: bool) {
        if self.tabs.activate_relative(forward).is_some() {
            self.persist_tabs().await;
            let followups = self.converge(true);
            self.run_followups(followups).await;
        }
    }

    /// Buffer edit from the editor widget. Not persisted.
    pub fn update_content(&mut self, id: TabId, content: String) -> Result<()> {
        self.tabs.update_content(id, content)
    }

    pub async fn set_language(&mut self, id: TabId, language: &str) -> Result<()> {
        self.tabs.set_language(id, language)?;
        self.persist_tabs().await;
        Ok(())
    }

    /// Write a tab to disk, optionally to a new path (save-as).
    pub async fn save(
        &mut self,
        id: TabId,
        path_override: Option<&Path>,
        confirm_overwrite: bool,
    ) -> Result<SaveOutcome> {
        let tab = self.tabs.get(id).ok_or(AppError::TabNotFound(id))?;
        let target = match path_override {
            Some(p) => normalize_path(p),
            None => tab.path.clone().ok_or(AppError::NoSavePath)?,
        };
        if self
            .tabs
            .find_by_path(&target)
            .is_some_and(|other| other.id != id)
        {
            return Err(AppError::PathAlreadyOpen(target));
        }
        let same_file = tab.path.as_deref() == Some(target.as_path());
        if same_file && tab.externally_modified && !tab.deleted_on_disk && !confirm_overwrite {
            return Ok(SaveOutcome::NeedsOverwriteConfirmation);
        }

        let content = tab.content.clone();
        if !self.bridge.write_file(&target, &content).await {
            self.notifications
                .error(format!("Could not save {}", target.display()));
            return Err(AppError::WriteFailed(target));
        }
        self.tabs.mark_saved(id, &target)?;
        self.bump_sync_epoch(id);
        self.notifications.dismiss_for_tab(id);
        info!(tab = %id, path = %target.display(), "saved");
        self.persist_tabs().await;

        if !same_file {
            let parent = parent_dir(&target);
            if self.tree.as_ref().is_some_and(|t| t.is_loaded(&parent)) {
                let refresh = self.refresh_followup(&parent, true);
                self.run_followups(refresh.into_iter().collect()).await;
            }
            let followups = self.converge(true);
            self.run_followups(followups).await;
        }
        Ok(SaveOutcome::Saved(target))
    }

    /// Replace a tab's buffer with what is on disk now.
    pub async fn reload_tab(&mut self, id: TabId) -> Result<()> {
        let path = self
            .tabs
            .get(id)
            .ok_or(AppError::TabNotFound(id))?
            .path
            .clone()
            .ok_or(AppError::NoSavePath)?;
        let fresh = match self.bridge.read_file(&path).await {
            Ok(fresh) => fresh,
            Err(e) => {
                self.notifications.error(e.to_string());
                return Err(e);
            }
        };
        self.tabs.reload(id, fresh)?;
        self.bump_sync_epoch(id);
        self.notifications.dismiss_for_tab(id);
        self.persist_tabs().await;
        Ok(())
    }

    /// Close a tab, asking for a decision first if it has unsaved changes.
    pub async fn close_tab(
        &mut self,
        id: TabId,
        resolution: Option<CloseResolution>,
    ) -> Result<CloseOutcome> {
        let tab = self.tabs.get(id).ok_or(AppError::TabNotFound(id))?;
        match (tab.modified, resolution) {
            (true, None) => return Ok(CloseOutcome::NeedsDecision),
            (true, Some(CloseResolution::Save)) => {
                if let SaveOutcome::NeedsOverwriteConfirmation = self.save(id, None, false).await? {
                    return Ok(CloseOutcome::NeedsDecision);
                }
            }
            _ => {}
        }
        let was_active = self.tabs.active_id() == Some(id);
        self.tabs.remove(id);
        self.sync_epochs.remove(&id);
        self.notifications.dismiss_for_tab(id);
        debug!(tab = %id, "tab closed");
        self.persist_tabs().await;
        if was_active {
            let followups = self.converge(true);
            self.run_followups(followups).await;
        }
        Ok(CloseOutcome::Closed)
    }

    /// Carry out the action attached to a notification.
    pub async fn run_action(&mut self, action: NotificationAction) -> Result<()> {
        match action {
            NotificationAction::ReloadTab(id) => self.reload_tab(id).await,
            NotificationAction::CloseTab(id) => self
                .close_tab(id, Some(CloseResolution::Discard))
                .await
                .map(|_| ()),
            NotificationAction::RestartWatch => {
                self.restart_watch().await;
                Ok(())
            }
        }
    }

    // ── Create ──────────────────────────────────────────────────────────────

    /// Create an empty file in `dir` and open it. On failure the message is
    /// returned for display and nothing else changes.
    pub async fn create_file(
        &mut self,
        dir: &Path,
        name: &str,
    ) -> std::result::Result<PathBuf, String> {
        let outcome = self.bridge.create_file(dir, name).await;
        let entry = match (outcome.success, outcome.entry) {
            (true, Some(entry)) => entry,
            _ => return Err(outcome.message.unwrap_or_else(|| "Could not create file".into())),
        };
        self.reveal_created(dir).await;
        if let Err(e) = self.open_file(&entry.path).await {
            warn!(path = %entry.path.display(), error = %e, "created file could not be opened");
        }
        Ok(entry.path)
    }

    /// Create an empty folder in `dir`.
    pub async fn create_folder(
        &mut self,
        dir: &Path,
        name: &str,
    ) -> std::result::Result<PathBuf, String> {
        let outcome = self.bridge.create_directory(dir, name).await;
        match (outcome.success, outcome.entry) {
            (true, Some(entry)) => {
                self.reveal_created(dir).await;
                Ok(entry.path)
            }
            _ => Err(outcome
                .message
                .unwrap_or_else(|| "Could not create folder".into())),
        }
    }

    async fn reveal_created(&mut self, dir: &Path) {
        let dir = normalize_path(dir);
        if self.root().is_some_and(|root| root != dir.as_path()) {
            self.expansion.expand(&dir);
        }
        let refresh = self.refresh_followup(&dir, true);
        self.run_followups(refresh.into_iter().collect()).await;
    }

    // ── Persistence ─────────────────────────────────────────────────────────

    async fn set_setting(&self, key: &str, value: Value) {
        if !self.bridge.set_setting(key, value).await {
            warn!(key, "setting was not saved");
        }
    }

    async fn persist_tabs(&self) {
        match serde_json::to_value(self.tabs.tabs()) {
            Ok(value) => self.set_setting(KEY_TABS, value).await,
            Err(e) => warn!(error = %e, "cannot serialize tabs"),
        }
    }

    async fn persist_recent(&self) {
        match serde_json::to_value(&self.recent) {
            Ok(value) => self.set_setting(KEY_RECENT_PROJECTS, value).await,
            Err(e) => warn!(error = %e, "cannot serialize recent projects"),
        }
    }

    /// Load recent projects, dropping entries whose directory is gone.
    pub async fn load_recent_projects(&mut self) {
        let stored: Vec<RecentProject> = self
            .bridge
            .get_setting(KEY_RECENT_PROJECTS)
            .await
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let before = stored.len();
        let mut kept = Vec::with_capacity(before);
        for project in stored {
            if self.bridge.directory_exists(&project.path).await {
                kept.push(project);
            }
        }
        self.recent = kept;
        if self.recent.len() != before {
            debug!(pruned = before - self.recent.len(), "pruned recent projects");
            self.persist_recent().await;
        }
    }

    /// Persist the tab list with current buffers and stop watching.
    pub async fn shutdown(&mut self) {
        self.persist_tabs().await;
        self.bridge.stop_watch().await;
        self.watching = false;
        info!(tabs = self.tabs.len(), "workspace shut down");
    }

    /// Restore tabs and the last directory. `cli_root` wins over the stored one.
    pub async fn restore_session(&mut self, cli_root: Option<&Path>, restore: bool) -> Result<()> {
        self.load_recent_projects().await;
        if restore {
            if let Some(value) = self.bridge.get_setting(KEY_TABS).await {
                match serde_json::from_value::<Vec<Tab>>(value) {
                    Ok(tabs) => self.tabs.restore(tabs),
                    Err(e) => warn!(error = %e, "ignoring unreadable persisted tabs"),
                }
            }
        }

        let stored_root = if restore {
            self.bridge
                .get_setting(KEY_LAST_OPEN_DIRECTORY)
                .await
                .and_then(|v| v.as_str().map(PathBuf::from))
        } else {
            None
        };
        match (cli_root, stored_root) {
            (Some(root), _) => self.open_directory(root).await,
            (None, Some(root)) => {
                if let Err(e) = self.open_directory(&root).await {
                    warn!(root = %root.display(), error = %e, "last directory unavailable");
                }
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::LocalHostBridge;
    use crate::fs::watcher::WatchOptions;
    use crate::settings::SettingsStore;
    use std::fs;
    use tempfile::TempDir;

    fn options() -> WorkspaceOptions {
        WorkspaceOptions {
            watcher_enabled: false,
            show_hidden: false,
            notification_ttl: Duration::from_secs(4),
        }
    }

    fn bridge() -> Arc<dyn HostBridge> {
        Arc::new(LocalHostBridge::new(
            WatchOptions::default(),
            SettingsStore::in_memory(),
        ))
    }

    async fn workspace_at(tmp: &TempDir) -> (Workspace, PathBuf) {
        let root = normalize_path(tmp.path());
        let mut ws = Workspace::new(bridge(), options());
        ws.open_directory(&root).await.unwrap();
        (ws, root)
    }

    fn child_names(ws: &Workspace, dir: &Path) -> Vec<String> {
        ws.tree()
            .and_then(|t| t.find(dir))
            .and_then(|n| n.children.as_ref())
            .map(|c| c.iter().map(|n| n.name.clone()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn external_append_then_reload() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let file = root.join("a.txt");
        let id = ws.open_file(&file).await.unwrap();

        fs::write(&file, "hello world").unwrap();
        ws.apply_change(&ChangeEvent::new(ChangeKind::Change, &file)).await;

        let tab = ws.tabs().get(id).unwrap();
        assert!(tab.externally_modified);
        assert!(!tab.modified);
        assert_eq!(
            ws.notifications().latest_actionable().unwrap().action,
            Some(NotificationAction::ReloadTab(id))
        );

        ws.run_action(NotificationAction::ReloadTab(id)).await.unwrap();
        let tab = ws.tabs().get(id).unwrap();
        assert_eq!(tab.content, "hello world");
        assert!(!tab.modified);
        assert!(!tab.externally_modified);
        assert!(ws.notifications().latest_actionable().is_none());
    }

    #[tokio::test]
    async fn own_save_echo_is_not_an_external_change() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "v1").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let file = root.join("a.txt");
        let id = ws.open_file(&file).await.unwrap();

        ws.update_content(id, "v2".into()).unwrap();
        assert!(ws.tabs().get(id).unwrap().modified);
        assert_eq!(ws.save(id, None, false).await.unwrap(), SaveOutcome::Saved(file.clone()));
        ws.apply_change(&ChangeEvent::new(ChangeKind::Change, &file)).await;

        let tab = ws.tabs().get(id).unwrap();
        assert!(!tab.externally_modified);
        assert!(!tab.modified);
        assert_eq!(fs::read_to_string(&file).unwrap(), "v2");
    }

    #[tokio::test]
    async fn conflicting_save_needs_confirmation() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "base").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let file = root.join("a.txt");
        let id = ws.open_file(&file).await.unwrap();

        ws.update_content(id, "mine".into()).unwrap();
        fs::write(&file, "theirs").unwrap();
        ws.apply_change(&ChangeEvent::new(ChangeKind::Change, &file)).await;
        assert!(ws.tabs().get(id).unwrap().is_conflicting());

        assert_eq!(
            ws.save(id, None, false).await.unwrap(),
            SaveOutcome::NeedsOverwriteConfirmation
        );
        assert_eq!(fs::read_to_string(&file).unwrap(), "theirs");
        assert_eq!(ws.save(id, None, true).await.unwrap(), SaveOutcome::Saved(file.clone()));
        assert_eq!(fs::read_to_string(&file).unwrap(), "mine");
        assert!(!ws.tabs().get(id).unwrap().is_conflicting());
    }

    #[tokio::test]
    async fn unlink_flags_tab_and_gates_close() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "x").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let file = root.join("a.txt");
        let id = ws.open_file(&file).await.unwrap();

        fs::remove_file(&file).unwrap();
        ws.apply_change(&ChangeEvent::new(ChangeKind::Unlink, &file)).await;

        let tab = ws.tabs().get(id).unwrap();
        assert!(tab.modified);
        assert!(tab.externally_modified);
        assert!(child_names(&ws, &root).is_empty());
        assert_eq!(
            ws.notifications().latest_actionable().unwrap().action,
            Some(NotificationAction::CloseTab(id))
        );
        assert_eq!(ws.close_tab(id, None).await.unwrap(), CloseOutcome::NeedsDecision);
        assert_eq!(ws.tabs().len(), 1);

        // Re-saving recreates the file.
        assert_eq!(ws.save(id, None, false).await.unwrap(), SaveOutcome::Saved(file.clone()));
        assert!(file.exists());
        assert!(!ws.tabs().get(id).unwrap().modified);
    }

    #[tokio::test]
    async fn unlink_dir_forgets_expansion() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("src/inner")).unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        ws.toggle_folder(&root.join("src")).await;
        ws.toggle_folder(&root.join("src/inner")).await;
        assert_eq!(child_names(&ws, &root.join("src")), vec!["inner"]);

        fs::remove_dir_all(root.join("src")).unwrap();
        ws.apply_change(&ChangeEvent::new(ChangeKind::UnlinkDir, root.join("src"))).await;
        assert!(ws.expansion().expanded_paths().is_empty());
        assert!(child_names(&ws, &root).is_empty());
    }

    #[tokio::test]
    async fn add_refreshes_parent_only_when_loaded() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("closed")).unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;

        fs::write(root.join("new.txt"), "").unwrap();
        let followups = ws.handle_change(&ChangeEvent::new(ChangeKind::Add, root.join("new.txt")));
        assert_eq!(followups.len(), 1);
        ws.run_followups(followups).await;
        assert_eq!(child_names(&ws, &root), vec!["closed", "new.txt"]);

        fs::write(root.join("closed/x.txt"), "").unwrap();
        let followups =
            ws.handle_change(&ChangeEvent::new(ChangeKind::Add, root.join("closed/x.txt")));
        assert!(followups.is_empty());
    }

    #[tokio::test]
    async fn events_outside_root_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let (mut ws, _root) = workspace_at(&tmp).await;
        let followups = ws.handle_change(&ChangeEvent::new(ChangeKind::Add, "/elsewhere/a.txt"));
        assert!(followups.is_empty());
    }

    #[tokio::test]
    async fn refresh_from_old_root_is_discarded() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(second.path().join("keep.txt"), "").unwrap();
        let (mut ws, old_root) = workspace_at(&first).await;

        fs::write(old_root.join("late.txt"), "").unwrap();
        let stale = ws.handle_change(&ChangeEvent::new(ChangeKind::Add, old_root.join("late.txt")));
        let stale_results = {
            let mut out = Vec::new();
            for f in stale {
                out.push(perform(ws.bridge(), f).await);
            }
            out
        };

        let new_root = normalize_path(second.path());
        ws.open_directory(&new_root).await.unwrap();
        for result in stale_results {
            assert!(ws.complete(result).is_empty());
        }
        assert_eq!(child_names(&ws, &new_root), vec!["keep.txt"]);
        assert!(ws.tree().unwrap().find(&old_root.join("late.txt")).is_none());
    }

    #[tokio::test]
    async fn recheck_read_before_save_is_dropped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "base").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let file = root.join("a.txt");
        let id = ws.open_file(&file).await.unwrap();

        fs::write(&file, "theirs").unwrap();
        let pending = ws.handle_change(&ChangeEvent::new(ChangeKind::Change, &file));
        assert!(pending
            .iter()
            .any(|f| matches!(f, Followup::RecheckTab { id: t, .. } if *t == id)));
        let mut results = Vec::new();
        for f in pending {
            results.push(perform(ws.bridge(), f).await);
        }

        ws.update_content(id, "mine".into()).unwrap();
        assert_eq!(ws.save(id, None, false).await.unwrap(), SaveOutcome::Saved(file.clone()));
        for result in results {
            let more = ws.complete(result);
            ws.run_followups(more).await;
        }

        let tab = ws.tabs().get(id).unwrap();
        assert!(!tab.externally_modified);
        assert!(!tab.modified);
        assert!(ws.notifications().latest_actionable().is_none());
        assert_eq!(fs::read_to_string(&file).unwrap(), "mine");
    }

    #[tokio::test]
    async fn opening_nested_file_expands_and_loads_ancestors() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::write(tmp.path().join("a/b/c.txt"), "").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;

        ws.open_file(&root.join("a/b/c.txt")).await.unwrap();
        assert!(ws.expansion().is_expanded(&root.join("a")));
        assert!(ws.expansion().is_expanded(&root.join("a/b")));
        assert_eq!(child_names(&ws, &root.join("a/b")), vec!["c.txt"]);
        let names: Vec<String> = ws.visible_rows().into_iter().map(|r| r.name).collect();
        assert!(names.contains(&"c.txt".to_string()));
    }

    #[tokio::test]
    async fn manual_collapse_survives_refresh() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("f")).unwrap();
        fs::write(tmp.path().join("f/t.txt"), "").unwrap();
        fs::write(tmp.path().join("f/t2.txt"), "").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;

        ws.open_file(&root.join("f/t.txt")).await.unwrap();
        ws.toggle_folder(&root.join("f")).await;
        assert!(!ws.expansion().is_expanded(&root.join("f")));

        fs::write(root.join("other.txt"), "").unwrap();
        ws.apply_change(&ChangeEvent::new(ChangeKind::Add, root.join("other.txt"))).await;
        assert!(!ws.expansion().is_expanded(&root.join("f")));

        ws.open_file(&root.join("f/t2.txt")).await.unwrap();
        assert!(ws.expansion().is_expanded(&root.join("f")));
    }

    #[tokio::test]
    async fn close_all_keeps_active_ancestors_closed() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("f")).unwrap();
        fs::write(tmp.path().join("f/t.txt"), "").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        ws.open_file(&root.join("f/t.txt")).await.unwrap();

        ws.close_all_folders();
        ws.refresh_all().await;
        assert!(ws.expansion().expanded_paths().is_empty());
    }

    #[tokio::test]
    async fn untitled_save_needs_a_path() {
        let tmp = TempDir::new().unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let id = ws.new_untitled().await;
        ws.update_content(id, "draft".into()).unwrap();

        assert!(matches!(ws.save(id, None, false).await, Err(AppError::NoSavePath)));
        let target = root.join("draft.md");
        assert_eq!(
            ws.save(id, Some(&target), false).await.unwrap(),
            SaveOutcome::Saved(target.clone())
        );
        let tab = ws.tabs().get(id).unwrap();
        assert_eq!(tab.name, "draft.md");
        assert_eq!(tab.language, "markdown");
        assert_eq!(child_names(&ws, &root), vec!["draft.md"]);
    }

    #[tokio::test]
    async fn save_as_onto_open_path_is_refused() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        ws.open_file(&root.join("a.txt")).await.unwrap();
        let id = ws.new_untitled().await;
        assert!(matches!(
            ws.save(id, Some(&root.join("a.txt")), false).await,
            Err(AppError::PathAlreadyOpen(_))
        ));
    }

    #[tokio::test]
    async fn failed_write_leaves_tab_untouched() {
        let tmp = TempDir::new().unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let id = ws.new_untitled().await;
        ws.update_content(id, "x".into()).unwrap();
        let target = root.join("missing/dir/a.txt");
        assert!(matches!(
            ws.save(id, Some(&target), false).await,
            Err(AppError::WriteFailed(_))
        ));
        let tab = ws.tabs().get(id).unwrap();
        assert!(tab.path.is_none());
        assert!(tab.modified);
    }

    #[tokio::test]
    async fn close_with_discard_reactivates_neighbour() {
        let tmp = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(tmp.path().join(name), "").unwrap();
        }
        let (mut ws, root) = workspace_at(&tmp).await;
        let a = ws.open_file(&root.join("a.txt")).await.unwrap();
        let b = ws.open_file(&root.join("b.txt")).await.unwrap();
        let c = ws.open_file(&root.join("c.txt")).await.unwrap();
        ws.activate_tab(b).await;
        ws.update_content(b, "dirty".into()).unwrap();

        assert_eq!(ws.close_tab(b, None).await.unwrap(), CloseOutcome::NeedsDecision);
        assert_eq!(
            ws.close_tab(b, Some(CloseResolution::Discard)).await.unwrap(),
            CloseOutcome::Closed
        );
        assert_eq!(ws.tabs().active_id(), Some(c));
        assert_eq!(ws.close_tab(a, None).await.unwrap(), CloseOutcome::Closed);
        assert_eq!(fs::read_to_string(root.join("b.txt")).unwrap(), "");
    }

    #[tokio::test]
    async fn close_with_save_writes_first() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "old").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let id = ws.open_file(&root.join("a.txt")).await.unwrap();
        ws.update_content(id, "new".into()).unwrap();
        assert_eq!(
            ws.close_tab(id, Some(CloseResolution::Save)).await.unwrap(),
            CloseOutcome::Closed
        );
        assert!(ws.tabs().is_empty());
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn close_with_save_on_conflict_asks_first() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "base").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let file = root.join("a.txt");
        let id = ws.open_file(&file).await.unwrap();
        ws.update_content(id, "mine".into()).unwrap();
        fs::write(&file, "theirs").unwrap();
        ws.apply_change(&ChangeEvent::new(ChangeKind::Change, &file)).await;
        assert!(ws.tabs().get(id).unwrap().is_conflicting());

        assert_eq!(
            ws.close_tab(id, Some(CloseResolution::Save)).await.unwrap(),
            CloseOutcome::NeedsDecision
        );
        assert_eq!(fs::read_to_string(&file).unwrap(), "theirs");
        assert_eq!(ws.tabs().len(), 1);

        ws.save(id, None, true).await.unwrap();
        assert_eq!(ws.close_tab(id, None).await.unwrap(), CloseOutcome::Closed);
        assert_eq!(fs::read_to_string(&file).unwrap(), "mine");
        assert!(ws.tabs().is_empty());
    }

    #[tokio::test]
    async fn create_file_conflict_keeps_tree() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let before = Arc::clone(ws.tree().unwrap().root());

        let err = ws.create_file(&root, "a.txt").await.unwrap_err();
        assert!(err.contains("already exists"));
        assert!(Arc::ptr_eq(&before, ws.tree().unwrap().root()));
        assert!(ws.tabs().is_empty());

        let created = ws.create_file(&root, "b.txt").await.unwrap();
        assert_eq!(created, root.join("b.txt"));
        assert_eq!(child_names(&ws, &root), vec!["a.txt", "b.txt"]);
        assert_eq!(ws.tabs().active().unwrap().path.as_deref(), Some(created.as_path()));
    }

    #[tokio::test]
    async fn create_folder_expands_parent() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("src")).unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        ws.create_folder(&root.join("src"), "util").await.unwrap();
        assert!(ws.expansion().is_expanded(&root.join("src")));
        assert_eq!(child_names(&ws, &root.join("src")), vec!["util"]);
    }

    #[tokio::test]
    async fn rescan_rechecks_open_tabs() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "1").unwrap();
        fs::write(tmp.path().join("b.txt"), "1").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let a = ws.open_file(&root.join("a.txt")).await.unwrap();
        let b = ws.open_file(&root.join("b.txt")).await.unwrap();

        fs::write(root.join("a.txt"), "2").unwrap();
        fs::remove_file(root.join("b.txt")).unwrap();
        fs::write(root.join("c.txt"), "").unwrap();
        ws.apply_change(&ChangeEvent::new(ChangeKind::Rescan, &root)).await;

        assert!(ws.tabs().get(a).unwrap().externally_modified);
        assert!(ws.tabs().get(b).unwrap().deleted_on_disk);
        assert_eq!(child_names(&ws, &root), vec!["a.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn file_restored_with_same_content_clears_deleted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "same").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let file = root.join("a.txt");
        let id = ws.open_file(&file).await.unwrap();

        fs::remove_file(&file).unwrap();
        ws.apply_change(&ChangeEvent::new(ChangeKind::Unlink, &file)).await;
        fs::write(&file, "same").unwrap();
        ws.apply_change(&ChangeEvent::new(ChangeKind::Add, &file)).await;

        let tab = ws.tabs().get(id).unwrap();
        assert!(!tab.deleted_on_disk);
        assert!(!tab.modified);
        assert!(ws.notifications().latest_actionable().is_none());
    }

    #[tokio::test]
    async fn open_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let mut ws = Workspace::new(bridge(), options());
        assert!(matches!(
            ws.open_directory(&tmp.path().join("nope")).await,
            Err(AppError::InvalidPath(_))
        ));
        assert!(ws.tree().is_none());
    }

    #[tokio::test]
    async fn session_persists_and_restores() {
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().join("proj");
        fs::create_dir_all(proj.join("src")).unwrap();
        fs::write(proj.join("src/main.rs"), "fn main() {}").unwrap();
        let settings_path = tmp.path().join("settings.json");

        {
            let bridge: Arc<dyn HostBridge> = Arc::new(LocalHostBridge::new(
                WatchOptions::default(),
                SettingsStore::load(&settings_path),
            ));
            let mut ws = Workspace::new(bridge, options());
            ws.open_directory(&proj).await.unwrap();
            ws.open_file(&proj.join("src/main.rs")).await.unwrap();
            assert_eq!(ws.recent_projects().len(), 1);
        }

        let bridge: Arc<dyn HostBridge> = Arc::new(LocalHostBridge::new(
            WatchOptions::default(),
            SettingsStore::load(&settings_path),
        ));
        let mut ws = Workspace::new(bridge, options());
        ws.restore_session(None, true).await.unwrap();
        assert_eq!(ws.root(), Some(normalize_path(&proj).as_path()));
        assert_eq!(ws.tabs().len(), 1);
        assert_eq!(ws.tabs().active().unwrap().name, "main.rs");
        assert!(ws.expansion().is_expanded(&proj.join("src")));
        assert_eq!(ws.recent_projects()[0].name, "proj");
    }

    #[tokio::test]
    async fn recent_projects_prune_missing() {
        let tmp = TempDir::new().unwrap();
        let kept = tmp.path().join("kept");
        fs::create_dir(&kept).unwrap();
        let b = bridge();
        let stored = vec![
            RecentProject::now(&tmp.path().join("gone")),
            RecentProject::now(&kept),
        ];
        assert!(b
            .set_setting(KEY_RECENT_PROJECTS, serde_json::to_value(&stored).unwrap())
            .await);

        let mut ws = Workspace::new(b, options());
        ws.load_recent_projects().await;
        assert_eq!(ws.recent_projects().len(), 1);
        assert_eq!(ws.recent_projects()[0].name, "kept");
    }

    #[tokio::test]
    async fn close_directory_clears_tree_and_last_dir() {
        let tmp = TempDir::new().unwrap();
        let (mut ws, _root) = workspace_at(&tmp).await;
        ws.close_directory().await;
        assert!(ws.tree().is_none());
        assert!(ws.visible_rows().is_empty());
        assert!(ws.bridge().get_setting(KEY_LAST_OPEN_DIRECTORY).await.is_none());
    }

    #[tokio::test]
    async fn watch_health_reports_stop() {
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().join("proj");
        fs::create_dir(&proj).unwrap();
        let mut ws = Workspace::new(
            bridge(),
            WorkspaceOptions {
                watcher_enabled: true,
                ..options()
            },
        );
        ws.open_directory(&proj).await.unwrap();
        assert!(ws.is_watching());
        assert!(ws.check_watch().await);

        fs::remove_dir_all(&proj).unwrap();
        assert!(!ws.check_watch().await);
        assert_eq!(
            ws.notifications().latest_actionable().unwrap().action,
            Some(NotificationAction::RestartWatch)
        );
        assert!(!ws.restart_watch().await);
    }

    #[tokio::test]
    async fn shutdown_persists_unsaved_buffers() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        let (mut ws, root) = workspace_at(&tmp).await;
        let id = ws.open_file(&root.join("a.txt")).await.unwrap();
        ws.update_content(id, "hello there".into()).unwrap();
        ws.shutdown().await;

        let stored: Vec<Tab> =
            serde_json::from_value(ws.bridge().get_setting(KEY_TABS).await.unwrap()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "hello there");
        assert!(stored[0].modified);
        assert!(!ws.is_watching());
    }
}
