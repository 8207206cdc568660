use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use editor_shell::workspace::CloseResolution;

use crate::app::{App, AppMode, DialogKind, Focus};

/// Handle a key event.
pub async fn handle_key_event(app: &mut App, key: KeyEvent) {
    if let AppMode::Dialog(kind) = app.mode.clone() {
        handle_dialog_key(app, kind, key).await;
        return;
    }
    if handle_global_key(app, key).await {
        return;
    }
    match app.focus {
        Focus::Tree => handle_tree_key(app, key).await,
        Focus::Editor => handle_editor_key(app, key),
    }
}

/// Bindings that work regardless of focus. Returns whether the key was consumed.
async fn handle_global_key(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => app.quit(),
        KeyCode::Char('s') if ctrl => app.save_active().await,
        KeyCode::Char('s') if alt => {
            if let Some(tab) = app.workspace.tabs().active_id() {
                app.open_dialog(DialogKind::SaveAs { tab });
            }
        }
        KeyCode::Char('n') if ctrl => app.new_untitled().await,
        KeyCode::Char('o') if ctrl => app.open_dialog(DialogKind::OpenDirectory),
        KeyCode::Char('r') if ctrl => {
            app.workspace.load_recent_projects().await;
            app.open_dialog(DialogKind::RecentProjects);
        }
        KeyCode::Char('w') if ctrl => app.close_active().await,
        KeyCode::Char('l') if ctrl => {
            if let Some(tab) = app.workspace.tabs().active_id() {
                app.open_dialog(DialogKind::SetLanguage { tab });
            }
        }
        KeyCode::Char('g') if ctrl => app.run_notification_action().await,
        KeyCode::Right if alt => app.cycle_tab(true).await,
        KeyCode::Left if alt => app.cycle_tab(false).await,
        KeyCode::F(5) => {
            app.workspace.refresh_all().await;
            app.sync();
        }
        _ => return false,
    }
    true
}

async fn handle_tree_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        KeyCode::Char('g') | KeyCode::Home => app.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.select_last(),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => app.activate_selected().await,
        KeyCode::Char('h') | KeyCode::Left => app.collapse_selected().await,
        KeyCode::Char('a') => app.open_create_dialog(false),
        KeyCode::Char('A') => app.open_create_dialog(true),
        KeyCode::Char('r') => app.refresh_selected().await,
        KeyCode::Char('.') => {
            app.workspace.toggle_hidden();
            app.sync();
        }
        KeyCode::Char('C') => {
            app.workspace.close_all_folders();
            app.sync();
        }
        KeyCode::Char('x') => app.close_directory().await,
        KeyCode::Tab if app.workspace.tabs().active().is_some() => app.focus = Focus::Editor,
        KeyCode::Esc => app.dismiss_notification(),
        _ => {}
    }
}

fn handle_editor_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => app.focus = Focus::Tree,
        KeyCode::Char('z') if ctrl => app.edit(|e, _| e.undo()),
        KeyCode::Char('y') if ctrl => app.edit(|e, _| e.redo()),
        KeyCode::Char(c) if !ctrl => app.edit(|e, _| {
            e.insert_char(c);
            true
        }),
        KeyCode::Tab => app.edit(|e, width| {
            e.insert_indent(width);
            true
        }),
        KeyCode::Enter => app.edit(|e, _| {
            e.insert_newline();
            true
        }),
        KeyCode::Backspace => app.edit(|e, _| e.delete_char_before()),
        KeyCode::Delete => app.edit(|e, _| e.delete_char_at()),
        KeyCode::Up => move_cursor(app, |e| e.move_up()),
        KeyCode::Down => move_cursor(app, |e| e.move_down()),
        KeyCode::Left => move_cursor(app, |e| e.move_left()),
        KeyCode::Right => move_cursor(app, |e| e.move_right()),
        KeyCode::Home => move_cursor(app, |e| e.move_home()),
        KeyCode::End => move_cursor(app, |e| e.move_end()),
        KeyCode::PageUp => move_cursor(app, |e| e.page_up()),
        KeyCode::PageDown => move_cursor(app, |e| e.page_down()),
        _ => {}
    }
}

fn move_cursor(app: &mut App, f: impl FnOnce(&mut crate::editor::EditorState)) {
    if let Some(editor) = app.active_editor_mut() {
        f(editor);
    }
}

async fn handle_dialog_key(app: &mut App, kind: DialogKind, key: KeyEvent) {
    if key.code == KeyCode::Esc {
        app.close_dialog();
        return;
    }
    if kind.takes_text() {
        match key.code {
            KeyCode::Enter => app.submit_dialog().await,
            KeyCode::Backspace => app.dialog_delete_char(),
            KeyCode::Left => app.dialog_move_cursor_left(),
            KeyCode::Right => app.dialog_move_cursor_right(),
            KeyCode::Home => app.dialog_cursor_home(),
            KeyCode::End => app.dialog_cursor_end(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.dialog_input_char(c)
            }
            _ => {}
        }
        return;
    }
    match kind {
        DialogKind::RecentProjects => match key.code {
            KeyCode::Enter => app.submit_dialog().await,
            KeyCode::Char('j') | KeyCode::Down => app.dialog_select(true),
            KeyCode::Char('k') | KeyCode::Up => app.dialog_select(false),
            _ => {}
        },
        DialogKind::CloseDecision { tab } => match key.code {
            KeyCode::Char('s') | KeyCode::Enter => app.submit_dialog().await,
            KeyCode::Char('d') => app.close_tab(tab, Some(CloseResolution::Discard)).await,
            KeyCode::Char('c') => app.close_dialog(),
            _ => {}
        },
        DialogKind::OverwriteConfirm { tab, closing } => match key.code {
            KeyCode::Char('o') | KeyCode::Enter => app.confirm_overwrite(tab, closing).await,
            KeyCode::Char('r') => app.reload_tab(tab).await,
            KeyCode::Char('c') => app.close_dialog(),
            _ => {}
        },
        _ => {}
    }
}
