use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use editor_shell::fs::tree::VisibleRow;

use crate::components::palette;

/// Explorer widget that renders visible rows with box-drawing characters.
pub struct TreeWidget<'a> {
    rows: &'a [VisibleRow],
    selected: usize,
    scroll: usize,
    /// Path of the active tab's file, highlighted when visible.
    active: Option<&'a std::path::Path>,
    focused: bool,
    block: Option<Block<'a>>,
}

impl<'a> TreeWidget<'a> {
    pub fn new(rows: &'a [VisibleRow], selected: usize, scroll: usize) -> Self {
        Self {
            rows,
            selected,
            scroll,
            active: None,
            focused: true,
            block: None,
        }
    }

    pub fn active(mut self, path: Option<&'a std::path::Path>) -> Self {
        self.active = path;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Build the indentation prefix by walking back to each ancestor row.
    fn build_prefix(rows: &[VisibleRow], index: usize) -> String {
        let row = &rows[index];
        if row.depth == 0 {
            return String::new();
        }

        let mut prefix = String::new();
        for d in 1..row.depth {
            let ancestor_is_last = rows[..index]
                .iter()
                .rev()
                .take_while(|r| r.depth >= d)
                .find(|r| r.depth == d)
                .is_some_and(|r| r.is_last_sibling);
            prefix.push_str(if ancestor_is_last { "   " } else { "│  " });
        }
        prefix.push_str(if row.is_last_sibling { "└──" } else { "├──" });
        prefix
    }

    fn indicator(row: &VisibleRow) -> &'static str {
        match (row.is_dir, row.is_expanded) {
            (true, true) => "▾ ",
            (true, false) => "▸ ",
            (false, _) => "  ",
        }
    }
}

impl<'a> Widget for TreeWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        let height = inner.height as usize;
        if self.rows.is_empty() || height == 0 {
            return;
        }

        for (i, idx) in (self.scroll..self.rows.len()).take(height).enumerate() {
            let row = &self.rows[idx];
            let y = inner.y + i as u16;

            let style = if idx == self.selected {
                let bg = if self.focused {
                    palette::SURFACE1
                } else {
                    palette::SURFACE0
                };
                Style::default()
                    .bg(bg)
                    .fg(palette::TEXT)
                    .add_modifier(Modifier::BOLD)
            } else if row.is_stale {
                Style::default()
                    .fg(palette::OVERLAY0)
                    .add_modifier(Modifier::ITALIC)
            } else if self.active == Some(row.path.as_path()) {
                Style::default().fg(palette::MAUVE)
            } else if row.is_dir {
                Style::default()
                    .fg(palette::BLUE)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette::TEXT)
            };

            let text = format!(
                "{}{}{}",
                Self::build_prefix(self.rows, idx),
                Self::indicator(row),
                row.name
            );
            let line = Line::from(Span::styled(text, style));
            buf.set_line(inner.x, y, &line, inner.width);
        }
    }
}
