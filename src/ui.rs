use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::{Block, Borders},
    Frame,
};

use crate::app::{App, AppMode, DialogKind, Focus};
use crate::components::dialog::DialogWidget;
use crate::components::editor::EditorWidget;
use crate::components::palette;
use crate::components::status_bar::StatusBarWidget;
use crate::components::tabs::TabBarWidget;
use crate::components::tree::TreeWidget;

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let color = if focused {
        palette::BLUE
    } else {
        palette::SURFACE2
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

/// Render the application UI.
pub fn render(app: &mut App, frame: &mut Frame) {
    let [main_area, status_area] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .areas(frame.area());
    let [tree_area, right_area] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .areas(main_area);
    let [tabs_area, editor_area] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .areas(right_area);

    // Explorer
    app.update_tree_scroll(tree_area.height.saturating_sub(2) as usize);
    let rows = app.rows();
    let active_path = app
        .workspace
        .tabs()
        .active()
        .and_then(|t| t.path.clone());
    let tree_focused = app.focus == Focus::Tree;
    let tree = TreeWidget::new(&rows, app.selected, app.tree_scroll)
        .active(active_path.as_deref())
        .focused(tree_focused)
        .block(pane_block(format!(" {} ", app.root_label()), tree_focused));
    frame.render_widget(tree, tree_area);

    // Tabs and buffer
    frame.render_widget(TabBarWidget::new(app.workspace.tabs().tabs()), tabs_area);
    let editor_focused = app.focus == Focus::Editor;
    let title = app
        .workspace
        .tabs()
        .active()
        .map(|t| format!(" {} ", t.path.as_ref().map_or(t.name.clone(), |p| p.display().to_string())))
        .unwrap_or_default();
    let editor_height = editor_area.height.saturating_sub(2) as usize;
    match app.active_editor_mut() {
        Some(editor) => {
            editor.visible_height = editor_height;
            editor.ensure_cursor_visible();
            let widget = EditorWidget::new(editor)
                .show_cursor(editor_focused)
                .block(pane_block(title, editor_focused));
            frame.render_widget(widget, editor_area);
        }
        None => frame.render_widget(pane_block(String::new(), editor_focused), editor_area),
    }

    // Status bar
    let path_str = app
        .workspace
        .root()
        .map(|r| r.display().to_string())
        .unwrap_or_else(|| "no folder open".to_string());
    let file_info = match (app.workspace.tabs().active(), app.active_editor()) {
        (Some(tab), Some(editor)) => format!(
            "{}  Ln {}, Col {}",
            tab.language,
            editor.cursor_line + 1,
            editor.cursor_col + 1
        ),
        _ => String::new(),
    };
    let watcher = if app.workspace.root().is_none() {
        ""
    } else if app.workspace.is_watching() {
        "watching"
    } else {
        "watch inactive"
    };
    let status = StatusBarWidget::new(&path_str, &file_info)
        .watcher_status(watcher)
        .notification(app.workspace.notifications().latest());
    frame.render_widget(status, status_area);

    // Modal on top
    if let AppMode::Dialog(kind) = &app.mode {
        let subject = match kind {
            DialogKind::SaveAs { tab }
            | DialogKind::SetLanguage { tab }
            | DialogKind::CloseDecision { tab }
            | DialogKind::OverwriteConfirm { tab, .. } => {
                app.workspace.tabs().get(*tab).map(|t| t.name.clone())
            }
            _ => None,
        };
        let mut dialog = DialogWidget::new(&app.mode, &app.dialog_state)
            .recent(app.workspace.recent_projects());
        if let Some(name) = subject.as_deref() {
            dialog = dialog.subject(name);
        }
        frame.render_widget(dialog, frame.area());
    }
}
