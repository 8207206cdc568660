use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::components::palette;
use crate::editor::EditorState;

/// Widget for rendering the active buffer with line numbers and a cursor.
pub struct EditorWidget<'a> {
    editor: &'a EditorState,
    show_cursor: bool,
    block: Option<Block<'a>>,
}

impl<'a> EditorWidget<'a> {
    pub fn new(editor: &'a EditorState) -> Self {
        Self {
            editor,
            show_cursor: true,
            block: None,
        }
    }

    pub fn show_cursor(mut self, show: bool) -> Self {
        self.show_cursor = show;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl<'a> Widget for EditorWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        let gutter_w = self.editor.gutter_width();
        let code_width = inner.width.saturating_sub(gutter_w) as usize;
        if inner.height == 0 || code_width == 0 {
            return;
        }

        let scroll = self.editor.scroll_offset;
        for row in 0..inner.height as usize {
            let line_idx = scroll + row;
            let Some(content) = self.editor.buffer.get(line_idx) else {
                break;
            };
            let y = inner.y + row as u16;
            let is_current_line = line_idx == self.editor.cursor_line;

            let gutter_style = if is_current_line {
                Style::default()
                    .fg(palette::YELLOW)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette::OVERLAY0)
            };
            let number = format!("{:>width$} ", line_idx + 1, width = (gutter_w - 2) as usize);
            buf.set_span(inner.x, y, &Span::styled(number, gutter_style), gutter_w);
            buf.set_string(
                inner.x + gutter_w - 1,
                y,
                "│",
                Style::default().fg(palette::SURFACE1),
            );

            // Tabs are drawn as a single space so columns stay char-aligned.
            let visible: String = content
                .chars()
                .map(|c| if c == '\t' { ' ' } else { c })
                .take(code_width)
                .collect();
            let line_style = if is_current_line {
                Style::default().fg(palette::TEXT).bg(palette::SURFACE0)
            } else {
                Style::default().fg(palette::TEXT)
            };
            let code_x = inner.x + gutter_w;
            buf.set_line(
                code_x,
                y,
                &Line::from(Span::styled(visible, line_style)),
                code_width as u16,
            );

            if self.show_cursor && is_current_line && self.editor.cursor_col < code_width {
                let cursor_x = code_x + self.editor.cursor_col as u16;
                if let Some(cell) = buf.cell_mut((cursor_x, y)) {
                    cell.set_style(Style::default().bg(palette::TEXT).fg(palette::BASE));
                }
            }
        }
    }
}
