use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Widget},
};

use editor_shell::settings::RecentProject;

use crate::app::{AppMode, DialogKind, DialogState};
use crate::components::palette;

/// Dialog widget that renders a centered modal overlay.
pub struct DialogWidget<'a> {
    mode: &'a AppMode,
    dialog_state: &'a DialogState,
    recent: &'a [RecentProject],
    /// Name of the tab the dialog is about, if any.
    subject: Option<&'a str>,
}

impl<'a> DialogWidget<'a> {
    pub fn new(mode: &'a AppMode, dialog_state: &'a DialogState) -> Self {
        Self {
            mode,
            dialog_state,
            recent: &[],
            subject: None,
        }
    }

    pub fn recent(mut self, recent: &'a [RecentProject]) -> Self {
        self.recent = recent;
        self
    }

    pub fn subject(mut self, name: &'a str) -> Self {
        self.subject = Some(name);
        self
    }

    /// Calculate a centered rectangle within the given area.
    fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        Rect::new(x, y, width.min(area.width), height.min(area.height))
    }
}

impl<'a> Widget for DialogWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let AppMode::Dialog(kind) = self.mode else {
            return;
        };
        let subject = self.subject.unwrap_or("buffer");

        match kind {
            DialogKind::CreateFile { .. } => {
                render_input_dialog("New File", self.dialog_state, area, buf)
            }
            DialogKind::CreateFolder { .. } => {
                render_input_dialog("New Folder", self.dialog_state, area, buf)
            }
            DialogKind::SaveAs { .. } => {
                render_input_dialog(&format!("Save {subject} As"), self.dialog_state, area, buf)
            }
            DialogKind::OpenDirectory => {
                render_input_dialog("Open Folder", self.dialog_state, area, buf)
            }
            DialogKind::SetLanguage { .. } => render_input_dialog(
                "Language (empty or \"auto\" to detect)",
                self.dialog_state,
                area,
                buf,
            ),
            DialogKind::CloseDecision { .. } => render_choice_dialog(
                "Unsaved Changes",
                &format!("{subject} has unsaved changes."),
                "[s] Save  [d] Discard  [c/Esc] Cancel",
                area,
                buf,
            ),
            DialogKind::OverwriteConfirm { .. } => render_choice_dialog(
                "File Changed on Disk",
                &format!("{subject} changed on disk since it was opened."),
                "[o] Overwrite  [r] Reload  [c/Esc] Cancel",
                area,
                buf,
            ),
            DialogKind::RecentProjects => {
                render_recent_dialog(self.recent, self.dialog_state.selected, area, buf)
            }
        }
    }
}

fn dialog_block(title: &str) -> Block<'_> {
    Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette::BLUE))
        .padding(Padding::horizontal(1))
}

fn hint_line(hint: &str) -> Line<'_> {
    Line::from(Span::styled(
        hint,
        Style::default()
            .fg(palette::OVERLAY0)
            .add_modifier(Modifier::DIM),
    ))
}

fn render_input_dialog(title: &str, state: &DialogState, area: Rect, buf: &mut Buffer) {
    let dialog_width = 60.min(area.width.saturating_sub(4));
    let dialog_height = if state.error.is_some() { 6 } else { 5 };
    let rect = DialogWidget::centered_rect(dialog_width, dialog_height, area);

    Clear.render(rect, buf);
    let block = dialog_block(title);
    let inner = block.inner(rect);
    block.render(rect, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let input = &state.input;
    let cursor_pos = state.cursor_position.min(input.len());
    let before = &input[..cursor_pos];
    let mut rest = input[cursor_pos..].chars();
    let cursor_char = rest.next().map(String::from).unwrap_or_else(|| " ".into());
    let after: String = rest.collect();

    // Keep the cursor in view by dropping chars from the left.
    let max_width = inner.width as usize;
    let before_chars = before.chars().count();
    let before_display: String = if before_chars + 1 > max_width {
        before
            .chars()
            .skip(before_chars + 1 - max_width)
            .collect()
    } else {
        before.to_string()
    };

    let input_style = Style::default().fg(palette::TEXT);
    let cursor_style = Style::default()
        .bg(palette::TEXT)
        .fg(palette::BASE)
        .add_modifier(Modifier::BOLD);
    let line = Line::from(vec![
        Span::styled(before_display, input_style),
        Span::styled(cursor_char, cursor_style),
        Span::styled(after, input_style),
    ]);
    buf.set_line(inner.x, inner.y + 1, &line, inner.width);

    if let Some(error) = &state.error {
        let error_line = Line::from(Span::styled(
            error.as_str(),
            Style::default().fg(palette::RED),
        ));
        buf.set_line(inner.x, inner.y + 2, &error_line, inner.width);
    }

    if inner.height > 2 {
        buf.set_line(
            inner.x,
            inner.y + inner.height - 1,
            &hint_line("[Enter] Confirm  [Esc] Cancel"),
            inner.width,
        );
    }
}

fn render_choice_dialog(title: &str, message: &str, hint: &str, area: Rect, buf: &mut Buffer) {
    let dialog_width = (message.chars().count().max(hint.len()) as u16 + 6)
        .max(40)
        .min(area.width.saturating_sub(4));
    let rect = DialogWidget::centered_rect(dialog_width, 5, area);

    Clear.render(rect, buf);
    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette::YELLOW))
        .padding(Padding::horizontal(1));
    let inner = block.inner(rect);
    block.render(rect, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let message_line = Line::from(Span::styled(
        message,
        Style::default()
            .fg(palette::YELLOW)
            .add_modifier(Modifier::BOLD),
    ));
    buf.set_line(inner.x, inner.y, &message_line, inner.width);
    if inner.height > 1 {
        buf.set_line(inner.x, inner.y + inner.height - 1, &hint_line(hint), inner.width);
    }
}

fn render_recent_dialog(recent: &[RecentProject], selected: usize, area: Rect, buf: &mut Buffer) {
    let dialog_width = 70.min(area.width.saturating_sub(4));
    let dialog_height = (recent.len().max(1) as u16 + 4).min(area.height.saturating_sub(2));
    let rect = DialogWidget::centered_rect(dialog_width, dialog_height, area);

    Clear.render(rect, buf);
    let block = dialog_block("Recent Folders");
    let inner = block.inner(rect);
    block.render(rect, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if recent.is_empty() {
        let empty = Line::from(Span::styled(
            "No recent folders",
            Style::default().fg(palette::OVERLAY0),
        ));
        buf.set_line(inner.x, inner.y, &empty, inner.width);
    }

    let max_items = inner.height.saturating_sub(2) as usize;
    for (i, project) in recent.iter().take(max_items).enumerate() {
        let style = if i == selected {
            Style::default()
                .bg(palette::SURFACE1)
                .fg(palette::TEXT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette::TEXT)
        };
        let line = Line::from(vec![
            Span::styled(format!("{:<20}", project.name), style),
            Span::styled(
                format!(" {}", project.path.display()),
                Style::default().fg(palette::OVERLAY0),
            ),
        ]);
        buf.set_line(inner.x, inner.y + i as u16, &line, inner.width);
    }

    buf.set_line(
        inner.x,
        inner.y + inner.height - 1,
        &hint_line("[Enter] Open  [j/k] Move  [Esc] Cancel"),
        inner.width,
    );
}
