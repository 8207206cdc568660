use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use editor_shell::error::AppError;
use editor_shell::fs::paths::parent_dir;
use editor_shell::fs::tree::VisibleRow;
use editor_shell::fs::watcher::ChangeEvent;
use editor_shell::tabs::TabId;
use editor_shell::workspace::{
    perform, CloseOutcome, CloseResolution, Followup, FollowupResult, SaveOutcome, Workspace,
};

use crate::editor::EditorState;
use crate::event::Event;

/// How often the watch session is polled for health.
pub const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Which pane receives keys.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Tree,
    Editor,
}

/// The kind of dialog being displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogKind {
    CreateFile { dir: PathBuf },
    CreateFolder { dir: PathBuf },
    SaveAs { tab: TabId },
    OpenDirectory,
    SetLanguage { tab: TabId },
    /// Unsaved tab is being closed: save, discard or cancel.
    CloseDecision { tab: TabId },
    /// The file changed on disk since the tab last synced: overwrite, reload or cancel.
    OverwriteConfirm { tab: TabId, closing: bool },
    RecentProjects,
}

impl DialogKind {
    pub fn takes_text(&self) -> bool {
        matches!(
            self,
            DialogKind::CreateFile { .. }
                | DialogKind::CreateFolder { .. }
                | DialogKind::SaveAs { .. }
                | DialogKind::OpenDirectory
                | DialogKind::SetLanguage { .. }
        )
    }
}

/// Application mode.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum AppMode {
    #[default]
    Normal,
    Dialog(DialogKind),
}

/// State for a dialog's text input or list selection.
#[derive(Debug, Default)]
pub struct DialogState {
    pub input: String,
    pub cursor_position: usize,
    /// Inline failure message; the dialog stays open while it is shown.
    pub error: Option<String>,
    pub selected: usize,
}

/// Main application state.
pub struct App {
    pub workspace: Workspace,
    pub focus: Focus,
    pub mode: AppMode,
    pub dialog_state: DialogState,
    /// Index into the explorer rows.
    pub selected: usize,
    pub tree_scroll: usize,
    pub should_quit: bool,
    selected_path: Option<PathBuf>,
    editors: HashMap<TabId, EditorState>,
    tab_width: usize,
    event_tx: UnboundedSender<Event>,
    last_watch_check: Instant,
}

impl App {
    pub fn new(workspace: Workspace, tab_width: usize, event_tx: UnboundedSender<Event>) -> Self {
        let mut app = Self {
            workspace,
            focus: Focus::Tree,
            mode: AppMode::Normal,
            dialog_state: DialogState::default(),
            selected: 0,
            tree_scroll: 0,
            should_quit: false,
            selected_path: None,
            editors: HashMap::new(),
            tab_width: tab_width.max(1),
            event_tx,
            last_watch_check: Instant::now(),
        };
        app.sync();
        app
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    // ── Background work ───────────────────────────────────────────────

    /// Run followups on spawned tasks; results come back as [`Event::FollowupDone`].
    fn dispatch(&self, followups: Vec<Followup>) {
        for followup in followups {
            let bridge = self.workspace.bridge();
            let tx = self.event_tx.clone();
            tokio::spawn(async move {
                let result = perform(bridge, followup).await;
                let _ = tx.send(Event::FollowupDone(result));
            });
        }
    }

    pub fn on_change(&mut self, event: ChangeEvent) {
        let followups = self.workspace.handle_change(&event);
        self.dispatch(followups);
    }

    pub fn on_followup_done(&mut self, result: FollowupResult) {
        let followups = self.workspace.complete(result);
        self.dispatch(followups);
    }

    /// Expire toasts and poll watch health on the slow interval.
    pub async fn tick(&mut self, now: Instant) {
        self.workspace.notifications_mut().expire(now);
        if now.saturating_duration_since(self.last_watch_check) >= WATCH_POLL_INTERVAL {
            self.last_watch_check = now;
            self.workspace.check_watch().await;
        }
    }

    /// Re-resolve the selection against the current rows and resync the active editor.
    pub fn sync(&mut self) {
        let rows = self.workspace.visible_rows();
        if let Some(idx) = self
            .selected_path
            .as_ref()
            .and_then(|p| rows.iter().position(|r| &r.path == p))
        {
            self.selected = idx;
        } else {
            self.selected = self.selected.min(rows.len().saturating_sub(1));
        }
        self.selected_path = rows.get(self.selected).map(|r| r.path.clone());

        let open: Vec<TabId> = self.workspace.tabs().tabs().iter().map(|t| t.id).collect();
        self.editors.retain(|id, _| open.contains(id));
        if let Some(tab) = self.workspace.tabs().active() {
            match self.editors.get_mut(&tab.id) {
                Some(editor) => {
                    if editor.text() != tab.content {
                        editor.replace_content(&tab.content);
                    }
                }
                None => {
                    self.editors.insert(tab.id, EditorState::new(&tab.content));
                }
            }
        }
    }

    // ── Explorer ──────────────────────────────────────────────────────

    pub fn rows(&self) -> Vec<VisibleRow> {
        self.workspace.visible_rows()
    }

    pub fn selected_row(&self) -> Option<VisibleRow> {
        self.rows().into_iter().nth(self.selected)
    }

    fn select_index(&mut self, idx: usize) {
        let rows = self.rows();
        self.selected = idx.min(rows.len().saturating_sub(1));
        self.selected_path = rows.get(self.selected).map(|r| r.path.clone());
    }

    fn select_path(&mut self, path: &Path) {
        self.selected_path = Some(path.to_path_buf());
        self.sync();
    }

    pub fn select_next(&mut self) {
        self.select_index(self.selected + 1);
    }

    pub fn select_previous(&mut self) {
        self.select_index(self.selected.saturating_sub(1));
    }

    pub fn select_first(&mut self) {
        self.select_index(0);
    }

    pub fn select_last(&mut self) {
        self.select_index(usize::MAX);
    }

    /// Keep the selected row inside a viewport of `height` rows.
    pub fn update_tree_scroll(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.selected < self.tree_scroll {
            self.tree_scroll = self.selected;
        } else if self.selected >= self.tree_scroll + height {
            self.tree_scroll = self.selected + 1 - height;
        }
    }

    /// Directory new entries go into: the selected folder, or the selected file's parent.
    pub fn current_dir(&self) -> Option<PathBuf> {
        match self.selected_row() {
            Some(row) if row.is_dir => Some(row.path),
            Some(row) => Some(parent_dir(&row.path)),
            None => self.workspace.root().map(Path::to_path_buf),
        }
    }

    /// Enter on a row: folders toggle, files open in the editor.
    pub async fn activate_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.is_dir {
            if row.depth > 0 {
                self.workspace.toggle_folder(&row.path).await;
            }
        } else if self.workspace.open_file(&row.path).await.is_ok() {
            self.focus = Focus::Editor;
        }
        self.sync();
    }

    /// Collapse an expanded folder, otherwise jump to the parent row.
    pub async fn collapse_selected(&mut self) {
        let Some(row) = self.selected_row() else {
            return;
        };
        if row.is_dir && row.is_expanded && row.depth > 0 {
            self.workspace.toggle_folder(&row.path).await;
            self.sync();
        } else if row.depth > 0 {
            self.select_path(&parent_dir(&row.path));
        }
    }

    pub async fn refresh_selected(&mut self) {
        if let Some(dir) = self.current_dir() {
            self.workspace.refresh_directory(&dir).await;
            self.sync();
        }
    }

    /// Select the active tab's file in the explorer if it is showing.
    fn reveal_active(&mut self) {
        if let Some(path) = self.workspace.tabs().active().and_then(|t| t.path.clone()) {
            if self.rows().iter().any(|r| r.path == path) {
                self.select_path(&path);
                return;
            }
        }
        self.sync();
    }

    // ── Editor ────────────────────────────────────────────────────────

    pub fn active_editor(&self) -> Option<&EditorState> {
        let id = self.workspace.tabs().active_id()?;
        self.editors.get(&id)
    }

    pub fn active_editor_mut(&mut self) -> Option<&mut EditorState> {
        let id = self.workspace.tabs().active_id()?;
        self.editors.get_mut(&id)
    }

    /// Apply an edit to the active buffer and push the result into its tab.
    pub fn edit(&mut self, f: impl FnOnce(&mut EditorState, usize) -> bool) {
        let Some(id) = self.workspace.tabs().active_id() else {
            return;
        };
        let tab_width = self.tab_width;
        let Some(editor) = self.editors.get_mut(&id) else {
            return;
        };
        if f(editor, tab_width) {
            let text = editor.text();
            if let Err(e) = self.workspace.update_content(id, text) {
                debug!(error = %e, "buffer edit for a closed tab");
            }
        }
    }

    // ── Tabs ──────────────────────────────────────────────────────────

    pub async fn new_untitled(&mut self) {
        self.workspace.new_untitled().await;
        self.focus = Focus::Editor;
        self.sync();
    }

    pub async fn cycle_tab(&mut self, forward: bool) {
        self.workspace.cycle_tab(forward).await;
        self.reveal_active();
    }

    pub async fn save_active(&mut self) {
        if let Some(id) = self.workspace.tabs().active_id() {
            self.save(id, None, false).await;
        }
    }

    /// Returns whether the tab was written.
    async fn save(&mut self, id: TabId, path: Option<PathBuf>, confirm_overwrite: bool) -> bool {
        match self.workspace.save(id, path.as_deref(), confirm_overwrite).await {
            Ok(SaveOutcome::Saved(path)) => {
                let name = path.file_name().map(|n| n.to_string_lossy().to_string());
                self.workspace
                    .notifications_mut()
                    .info(format!("Saved {}", name.unwrap_or_default()));
                self.sync();
                true
            }
            Ok(SaveOutcome::NeedsOverwriteConfirmation) => {
                self.open_dialog(DialogKind::OverwriteConfirm {
                    tab: id,
                    closing: false,
                });
                false
            }
            Err(AppError::NoSavePath) => {
                self.open_dialog(DialogKind::SaveAs { tab: id });
                false
            }
            Err(e @ AppError::PathAlreadyOpen(_)) => {
                self.dialog_state.error = Some(e.to_string());
                false
            }
            // Write failures already raised a notification.
            Err(AppError::WriteFailed(_)) => false,
            Err(e) => {
                self.workspace.notifications_mut().error(e.to_string());
                false
            }
        }
    }

    pub async fn close_active(&mut self) {
        if let Some(id) = self.workspace.tabs().active_id() {
            self.close_tab(id, None).await;
        }
    }

    pub async fn close_tab(&mut self, id: TabId, resolution: Option<CloseResolution>) {
        match self.workspace.close_tab(id, resolution).await {
            Ok(CloseOutcome::Closed) => {
                self.close_dialog();
                self.reveal_active();
                if self.workspace.tabs().is_empty() {
                    self.focus = Focus::Tree;
                }
            }
            Ok(CloseOutcome::NeedsDecision) => match resolution {
                None => self.open_dialog(DialogKind::CloseDecision { tab: id }),
                Some(_) => self.open_dialog(DialogKind::OverwriteConfirm { tab: id, closing: true }),
            },
            Err(AppError::NoSavePath) => self.open_dialog(DialogKind::SaveAs { tab: id }),
            Err(AppError::WriteFailed(_)) => self.close_dialog(),
            Err(e) => {
                self.close_dialog();
                self.workspace.notifications_mut().error(e.to_string());
            }
        }
    }

    /// Overwrite the file on disk with the tab's buffer.
    pub async fn confirm_overwrite(&mut self, tab: TabId, closing: bool) {
        self.close_dialog();
        if self.save(tab, None, true).await && closing {
            self.close_tab(tab, None).await;
        }
    }

    /// Drop the buffer and take what is on disk.
    pub async fn reload_tab(&mut self, tab: TabId) {
        self.close_dialog();
        if self.workspace.reload_tab(tab).await.is_ok() {
            self.sync();
        }
    }

    // ── Notifications ─────────────────────────────────────────────────

    /// Carry out the action of the newest actionable notification.
    pub async fn run_notification_action(&mut self) {
        let Some((id, action)) = self
            .workspace
            .notifications()
            .latest_actionable()
            .and_then(|n| n.action.map(|a| (n.id, a)))
        else {
            return;
        };
        self.workspace.notifications_mut().dismiss(id);
        if let Err(e) = self.workspace.run_action(action).await {
            debug!(error = %e, action = action.label(), "notification action failed");
        }
        self.reveal_active();
    }

    pub fn dismiss_notification(&mut self) {
        if let Some(id) = self.workspace.notifications().latest().map(|n| n.id) {
            self.workspace.notifications_mut().dismiss(id);
        }
    }

    // ── Dialogs ───────────────────────────────────────────────────────

    pub fn open_dialog(&mut self, kind: DialogKind) {
        self.dialog_state = DialogState::default();
        let prefill = match &kind {
            DialogKind::SaveAs { tab } => self
                .workspace
                .tabs()
                .get(*tab)
                .map(|t| match &t.path {
                    Some(p) => p.display().to_string(),
                    None => t.name.clone(),
                }),
            DialogKind::SetLanguage { tab } => self
                .workspace
                .tabs()
                .get(*tab)
                .map(|t| t.language.clone()),
            DialogKind::OpenDirectory => self
                .workspace
                .root()
                .map(|r| r.display().to_string()),
            _ => None,
        };
        if let Some(text) = prefill {
            self.dialog_state.cursor_position = text.len();
            self.dialog_state.input = text;
        }
        self.mode = AppMode::Dialog(kind);
    }

    pub fn close_dialog(&mut self) {
        self.mode = AppMode::Normal;
        self.dialog_state = DialogState::default();
    }

    pub fn open_create_dialog(&mut self, folder: bool) {
        let Some(dir) = self.current_dir() else {
            self.workspace
                .notifications_mut()
                .warn("Open a directory first");
            return;
        };
        self.open_dialog(if folder {
            DialogKind::CreateFolder { dir }
        } else {
            DialogKind::CreateFile { dir }
        });
    }

    /// Resolve dialog input as a path: absolute as typed, otherwise under the root.
    fn input_path(&self) -> PathBuf {
        let typed = PathBuf::from(self.dialog_state.input.trim());
        match self.workspace.root() {
            Some(root) if typed.is_relative() => root.join(typed),
            _ => typed,
        }
    }

    /// Enter in a text or list dialog.
    pub async fn submit_dialog(&mut self) {
        let AppMode::Dialog(kind) = self.mode.clone() else {
            return;
        };
        let input = self.dialog_state.input.trim().to_string();
        match kind {
            DialogKind::CreateFile { dir } => match self.workspace.create_file(&dir, &input).await {
                Ok(path) => {
                    self.close_dialog();
                    self.focus = Focus::Editor;
                    self.select_path(&path);
                }
                Err(message) => self.dialog_state.error = Some(message),
            },
            DialogKind::CreateFolder { dir } => {
                match self.workspace.create_folder(&dir, &input).await {
                    Ok(path) => {
                        self.close_dialog();
                        self.select_path(&path);
                    }
                    Err(message) => self.dialog_state.error = Some(message),
                }
            }
            DialogKind::SaveAs { tab } => {
                if input.is_empty() {
                    self.dialog_state.error = Some("Enter a path".into());
                    return;
                }
                let path = self.input_path();
                if self.save(tab, Some(path), false).await {
                    self.close_dialog();
                    self.reveal_active();
                }
            }
            DialogKind::OpenDirectory => {
                let path = self.input_path();
                self.open_directory(&path).await;
            }
            DialogKind::SetLanguage { tab } => {
                let language = if input.is_empty() { "auto" } else { input.as_str() };
                match self.workspace.set_language(tab, language).await {
                    Ok(()) => self.close_dialog(),
                    Err(e) => self.dialog_state.error = Some(e.to_string()),
                }
            }
            DialogKind::RecentProjects => {
                let target = self
                    .workspace
                    .recent_projects()
                    .get(self.dialog_state.selected)
                    .map(|p| p.path.clone());
                if let Some(path) = target {
                    self.open_directory(&path).await;
                }
            }
            DialogKind::CloseDecision { tab } => {
                self.close_tab(tab, Some(CloseResolution::Save)).await;
            }
            DialogKind::OverwriteConfirm { tab, closing } => {
                self.confirm_overwrite(tab, closing).await;
            }
        }
    }

    async fn open_directory(&mut self, path: &Path) {
        match self.workspace.open_directory(path).await {
            Ok(()) => {
                self.close_dialog();
                self.focus = Focus::Tree;
                self.selected = 0;
                self.tree_scroll = 0;
                self.selected_path = None;
                self.reveal_active();
            }
            Err(e) => self.dialog_state.error = Some(e.to_string()),
        }
    }

    pub async fn close_directory(&mut self) {
        self.workspace.close_directory().await;
        self.selected = 0;
        self.tree_scroll = 0;
        self.selected_path = None;
        self.sync();
    }

    /// Explorer title: the root folder's name.
    pub fn root_label(&self) -> String {
        match self.workspace.root() {
            Some(root) => root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| root.display().to_string()),
            None => "no folder open".to_string(),
        }
    }

    pub fn dialog_list_len(&self) -> usize {
        match &self.mode {
            AppMode::Dialog(DialogKind::RecentProjects) => self.workspace.recent_projects().len(),
            _ => 0,
        }
    }

    pub fn dialog_select(&mut self, forward: bool) {
        let len = self.dialog_list_len();
        if len == 0 {
            return;
        }
        self.dialog_state.selected = if forward {
            (self.dialog_state.selected + 1).min(len - 1)
        } else {
            self.dialog_state.selected.saturating_sub(1)
        };
    }

    pub fn dialog_input_char(&mut self, c: char) {
        self.dialog_state
            .input
            .insert(self.dialog_state.cursor_position, c);
        self.dialog_state.cursor_position += c.len_utf8();
        self.dialog_state.error = None;
    }

    pub fn dialog_delete_char(&mut self) {
        let pos = self.dialog_state.cursor_position;
        if let Some(prev) = self.dialog_state.input[..pos].chars().next_back() {
            self.dialog_state.cursor_position -= prev.len_utf8();
            self.dialog_state
                .input
                .remove(self.dialog_state.cursor_position);
            self.dialog_state.error = None;
        }
    }

    pub fn dialog_move_cursor_left(&mut self) {
        let pos = self.dialog_state.cursor_position;
        if let Some(prev) = self.dialog_state.input[..pos].chars().next_back() {
            self.dialog_state.cursor_position -= prev.len_utf8();
        }
    }

    pub fn dialog_move_cursor_right(&mut self) {
        let pos = self.dialog_state.cursor_position;
        if let Some(next) = self.dialog_state.input[pos..].chars().next() {
            self.dialog_state.cursor_position += next.len_utf8();
        }
    }

    pub fn dialog_cursor_home(&mut self) {
        self.dialog_state.cursor_position = 0;
    }

    pub fn dialog_cursor_end(&mut self) {
        self.dialog_state.cursor_position = self.dialog_state.input.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;

    use editor_shell::bridge::LocalHostBridge;
    use editor_shell::fs::paths::normalize_path;
    use editor_shell::fs::watcher::{ChangeKind, WatchOptions};
    use editor_shell::settings::SettingsStore;
    use editor_shell::workspace::WorkspaceOptions;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    async fn setup_app() -> (TempDir, PathBuf, App, mpsc::UnboundedReceiver<Event>) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::create_dir(dir.path().join("beta")).unwrap();
        fs::write(dir.path().join("file_a.txt"), "a").unwrap();
        fs::write(dir.path().join("file_b.rs"), "fn main() {}\n").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();
        let root = normalize_path(dir.path());

        let bridge = Arc::new(LocalHostBridge::new(
            WatchOptions::default(),
            SettingsStore::in_memory(),
        ));
        let mut workspace = Workspace::new(
            bridge,
            WorkspaceOptions {
                watcher_enabled: false,
                ..WorkspaceOptions::default()
            },
        );
        workspace.open_directory(&root).await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        (dir, root, App::new(workspace, 4, tx), rx)
    }

    fn select_named(app: &mut App, name: &str) {
        let idx = app.rows().iter().position(|r| r.name == name).unwrap();
        app.select_index(idx);
    }

    #[tokio::test]
    async fn selection_moves_and_clamps() {
        let (_dir, _root, mut app, _rx) = setup_app().await;
        assert_eq!(app.selected, 0);
        app.select_previous();
        assert_eq!(app.selected, 0);
        app.select_next();
        assert_eq!(app.selected_row().unwrap().name, "alpha");
        app.select_last();
        assert_eq!(app.selected_row().unwrap().name, "file_b.rs");
        app.select_next();
        assert_eq!(app.selected_row().unwrap().name, "file_b.rs");
        app.select_first();
        assert_eq!(app.selected, 0);
    }

    #[tokio::test]
    async fn enter_on_file_opens_tab_and_focuses_editor() {
        let (_dir, _root, mut app, _rx) = setup_app().await;
        select_named(&mut app, "file_b.rs");
        app.activate_selected().await;
        assert_eq!(app.focus, Focus::Editor);
        let tab = app.workspace.tabs().active().unwrap();
        assert_eq!(tab.language, "rust");
        assert_eq!(app.active_editor().unwrap().text(), "fn main() {}\n");
    }

    #[tokio::test]
    async fn edits_flow_into_the_tab() {
        let (_dir, _root, mut app, _rx) = setup_app().await;
        select_named(&mut app, "file_a.txt");
        app.activate_selected().await;

        app.edit(|e, _| {
            e.move_end();
            e.insert_char('b');
            true
        });
        assert!(app.workspace.tabs().active().unwrap().modified);

        app.edit(|e, _| e.undo());
        assert!(!app.workspace.tabs().active().unwrap().modified);
    }

    #[tokio::test]
    async fn selection_survives_refresh() {
        let (dir, root, mut app, _rx) = setup_app().await;
        select_named(&mut app, "file_b.rs");
        fs::write(dir.path().join("aaa.txt"), "").unwrap();
        app.workspace.refresh_directory(&root).await;
        app.sync();
        assert_eq!(app.selected_row().unwrap().name, "file_b.rs");
    }

    #[tokio::test]
    async fn create_file_failure_keeps_dialog_open() {
        let (_dir, _root, mut app, _rx) = setup_app().await;
        app.select_first();
        app.open_create_dialog(false);
        for c in "file_a.txt".chars() {
            app.dialog_input_char(c);
        }
        app.submit_dialog().await;
        assert!(matches!(app.mode, AppMode::Dialog(DialogKind::CreateFile { .. })));
        assert!(app.dialog_state.error.as_deref().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn create_file_opens_and_selects_it() {
        let (_dir, root, mut app, _rx) = setup_app().await;
        app.select_first();
        app.open_create_dialog(false);
        for c in "new.md".chars() {
            app.dialog_input_char(c);
        }
        app.submit_dialog().await;
        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.selected_row().unwrap().path, root.join("new.md"));
        assert_eq!(app.workspace.tabs().active().unwrap().name, "new.md");
    }

    #[tokio::test]
    async fn closing_modified_tab_asks_first() {
        let (_dir, _root, mut app, _rx) = setup_app().await;
        select_named(&mut app, "file_a.txt");
        app.activate_selected().await;
        app.edit(|e, _| {
            e.insert_char('x');
            true
        });
        let id = app.workspace.tabs().active_id().unwrap();
        app.close_active().await;
        assert_eq!(app.mode, AppMode::Dialog(DialogKind::CloseDecision { tab: id }));

        app.close_tab(id, Some(CloseResolution::Discard)).await;
        assert!(app.workspace.tabs().is_empty());
        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.focus, Focus::Tree);
    }

    #[tokio::test]
    async fn saving_untitled_asks_for_a_path() {
        let (_dir, root, mut app, _rx) = setup_app().await;
        app.new_untitled().await;
        app.edit(|e, _| {
            e.insert_char('z');
            true
        });
        app.save_active().await;
        let id = app.workspace.tabs().active_id().unwrap();
        assert_eq!(app.mode, AppMode::Dialog(DialogKind::SaveAs { tab: id }));

        app.dialog_state.input.clear();
        app.dialog_cursor_home();
        for c in "alpha/z.txt".chars() {
            app.dialog_input_char(c);
        }
        app.submit_dialog().await;
        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(fs::read_to_string(root.join("alpha/z.txt")).unwrap(), "z");
        assert_eq!(app.selected_row().unwrap().name, "z.txt");
    }

    #[tokio::test]
    async fn change_events_round_trip_through_followups() {
        let (dir, root, mut app, mut rx) = setup_app().await;
        fs::write(dir.path().join("late.txt"), "").unwrap();
        app.on_change(ChangeEvent::new(ChangeKind::Add, root.join("late.txt")));

        let Some(Event::FollowupDone(result)) = rx.recv().await else {
            panic!("expected a followup result");
        };
        app.on_followup_done(result);
        app.sync();
        assert!(app.rows().iter().any(|r| r.name == "late.txt"));
    }

    #[tokio::test]
    async fn reload_action_replaces_editor_text() {
        let (dir, root, mut app, _rx) = setup_app().await;
        select_named(&mut app, "file_a.txt");
        app.activate_selected().await;
        fs::write(dir.path().join("file_a.txt"), "from disk").unwrap();
        app.workspace
            .apply_change(&ChangeEvent::new(ChangeKind::Change, root.join("file_a.txt")))
            .await;
        app.run_notification_action().await;
        assert_eq!(app.active_editor().unwrap().text(), "from disk");
    }

    #[tokio::test]
    async fn dialog_text_editing() {
        let (_dir, _root, mut app, _rx) = setup_app().await;
        app.open_dialog(DialogKind::OpenDirectory);
        app.dialog_state.input.clear();
        app.dialog_cursor_home();
        app.dialog_input_char('a');
        app.dialog_input_char('é');
        app.dialog_move_cursor_left();
        app.dialog_delete_char();
        assert_eq!(app.dialog_state.input, "é");
        app.dialog_cursor_end();
        assert_eq!(app.dialog_state.cursor_position, 2);
        app.dialog_move_cursor_right();
        assert_eq!(app.dialog_state.cursor_position, 2);
        app.close_dialog();
        assert_eq!(app.mode, AppMode::Normal);
    }

    #[tokio::test]
    async fn tree_scroll_follows_selection() {
        let (_dir, _root, mut app, _rx) = setup_app().await;
        app.select_last();
        app.update_tree_scroll(2);
        assert_eq!(app.tree_scroll, app.selected - 1);
        app.select_first();
        app.update_tree_scroll(2);
        assert_eq!(app.tree_scroll, 0);
    }
}
