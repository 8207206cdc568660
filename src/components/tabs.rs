use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use editor_shell::tabs::Tab;

use crate::components::palette;

/// One-line strip of open tabs.
///
/// Markers: `●` unsaved changes, `!` changed on disk, `✗` deleted from disk.
pub struct TabBarWidget<'a> {
    tabs: &'a [Tab],
}

impl<'a> TabBarWidget<'a> {
    pub fn new(tabs: &'a [Tab]) -> Self {
        Self { tabs }
    }

    fn label(tab: &Tab) -> String {
        let marker = if tab.deleted_on_disk {
            " ✗"
        } else if tab.externally_modified {
            " !"
        } else if tab.modified {
            " ●"
        } else {
            ""
        };
        format!(" {}{} ", tab.name, marker)
    }
}

impl<'a> Widget for TabBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        if self.tabs.is_empty() {
            let hint = Span::styled(
                " no open files  (Ctrl+N new, Enter in explorer opens) ",
                Style::default().fg(palette::OVERLAY0),
            );
            buf.set_line(area.x, area.y, &Line::from(hint), area.width);
            return;
        }

        let mut spans = Vec::with_capacity(self.tabs.len() * 2);
        for tab in self.tabs {
            let mut style = if tab.active {
                Style::default()
                    .bg(palette::SURFACE1)
                    .fg(palette::TEXT)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette::OVERLAY0)
            };
            if tab.deleted_on_disk {
                style = style.fg(palette::RED).add_modifier(Modifier::CROSSED_OUT);
            } else if tab.externally_modified {
                style = style.fg(palette::YELLOW);
            }
            spans.push(Span::styled(Self::label(tab), style));
            spans.push(Span::styled("│", Style::default().fg(palette::SURFACE2)));
        }
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use editor_shell::tabs::TabManager;

    fn line(buf: &Buffer, width: u16) -> String {
        (0..width)
            .map(|x| buf.cell((x, 0)).unwrap().symbol().to_string())
            .collect()
    }

    #[test]
    fn shows_names_and_markers() {
        let mut tabs = TabManager::new();
        let a = tabs.open(Path::new("/proj/a.rs"), "a".into());
        tabs.open(Path::new("/proj/b.rs"), "b".into());
        tabs.update_content(a, "changed".into()).unwrap();

        let area = Rect::new(0, 0, 40, 1);
        let mut buf = Buffer::empty(area);
        TabBarWidget::new(tabs.tabs()).render(area, &mut buf);
        let text = line(&buf, 40);
        assert!(text.contains("a.rs ●"));
        assert!(text.contains("b.rs"));
    }

    #[test]
    fn deleted_tab_is_marked() {
        let mut tabs = TabManager::new();
        let a = tabs.open(Path::new("/proj/a.rs"), "a".into());
        tabs.flag_deleted(a).unwrap();

        let area = Rect::new(0, 0, 40, 1);
        let mut buf = Buffer::empty(area);
        TabBarWidget::new(tabs.tabs()).render(area, &mut buf);
        assert!(line(&buf, 40).contains("a.rs ✗"));
    }

    #[test]
    fn empty_bar_shows_hint() {
        let area = Rect::new(0, 0, 60, 1);
        let mut buf = Buffer::empty(area);
        TabBarWidget::new(&[]).render(area, &mut buf);
        assert!(line(&buf, 60).contains("no open files"));
    }
}
