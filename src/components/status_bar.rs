use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use editor_shell::notifications::{Notification, NotificationLevel};

use crate::components::palette;

/// Status bar: root path, buffer info and watcher state, or the newest notification.
pub struct StatusBarWidget<'a> {
    path_str: &'a str,
    file_info: &'a str,
    notification: Option<&'a Notification>,
    watcher_status: Option<&'a str>,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(path_str: &'a str, file_info: &'a str) -> Self {
        Self {
            path_str,
            file_info,
            notification: None,
            watcher_status: None,
        }
    }

    pub fn notification(mut self, notification: Option<&'a Notification>) -> Self {
        self.notification = notification;
        self
    }

    pub fn watcher_status(mut self, status: &'a str) -> Self {
        self.watcher_status = Some(status);
        self
    }

    fn render_notification(notification: &Notification, area: Rect, buf: &mut Buffer) {
        let style = match notification.level {
            NotificationLevel::Error => Style::default().bg(palette::RED).fg(palette::BASE),
            NotificationLevel::Warning => Style::default().bg(palette::YELLOW).fg(palette::BASE),
            NotificationLevel::Info => Style::default().fg(palette::GREEN),
        };
        let mut text = format!(" {}", notification.message);
        if let Some(action) = notification.action {
            text.push_str(&format!("  [Ctrl+G] {}  [Esc] dismiss", action.label()));
        }
        let width = area.width as usize;
        let display: String = if text.chars().count() >= width {
            text.chars().take(width).collect()
        } else {
            format!("{:<width$}", text, width = width)
        };
        buf.set_line(area.x, area.y, &Line::from(Span::styled(display, style)), area.width);
    }
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        if let Some(notification) = self.notification {
            Self::render_notification(notification, area, buf);
            return;
        }

        let key_hints = " ^S save  ^W close  ^O open  ^R recent  a/A new ";
        let width = area.width as usize;
        let watcher = self.watcher_status.unwrap_or("");
        let right_len = key_hints.len() + watcher.chars().count() + 1;
        let remaining = width.saturating_sub(right_len);

        let info_len = self.file_info.chars().count();
        let path_budget = remaining.saturating_sub(info_len + 1);
        let path_len = self.path_str.chars().count();
        let path_display: String = if path_len > path_budget {
            if path_budget > 3 {
                let tail: String = self
                    .path_str
                    .chars()
                    .skip(path_len - (path_budget - 3))
                    .collect();
                format!("...{}", tail)
            } else {
                self.path_str.chars().take(path_budget).collect()
            }
        } else {
            self.path_str.to_string()
        };
        let gap = remaining.saturating_sub(path_display.chars().count() + info_len);

        let watcher_style = if watcher == "watching" {
            Style::default().fg(palette::GREEN)
        } else {
            Style::default()
                .fg(palette::PEACH)
                .add_modifier(Modifier::BOLD)
        };
        let spans = vec![
            Span::styled(path_display, Style::default().fg(palette::TEXT)),
            Span::raw(" ".repeat(gap)),
            Span::styled(self.file_info, Style::default().fg(palette::BLUE)),
            Span::raw(" "),
            Span::styled(watcher, watcher_style),
            Span::styled(
                key_hints,
                Style::default()
                    .fg(palette::OVERLAY0)
                    .add_modifier(Modifier::DIM),
            ),
        ];
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use editor_shell::notifications::{NotificationAction, NotificationCenter};
    use editor_shell::tabs::TabId;

    fn render(widget: StatusBarWidget<'_>, width: u16) -> (Buffer, String) {
        let area = Rect::new(0, 0, width, 1);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        let content: String = (0..width)
            .map(|x| buf.cell((x, 0)).unwrap().symbol().to_string())
            .collect();
        (buf, content)
    }

    #[test]
    fn normal_bar_shows_path_info_and_watcher() {
        let widget =
            StatusBarWidget::new("/home/user/project", "rust  Ln 3, Col 7").watcher_status("watching");
        let (_, content) = render(widget, 120);
        assert!(content.contains("/home/user/project"));
        assert!(content.contains("Ln 3, Col 7"));
        assert!(content.contains("watching"));
        assert!(content.contains("^S save"));
    }

    #[test]
    fn long_path_is_truncated_from_the_left() {
        let long = format!("/{}", "deep/".repeat(40));
        let (_, content) = render(StatusBarWidget::new(&long, "txt"), 80);
        assert!(content.starts_with("..."));
    }

    #[test]
    fn warning_notification_offers_action() {
        let mut center = NotificationCenter::default();
        center.push(
            NotificationLevel::Warning,
            "a.txt changed on disk",
            Some(NotificationAction::ReloadTab(TabId(1))),
        );
        let widget = StatusBarWidget::new("/p", "").notification(center.latest());
        let (buf, content) = render(widget, 80);
        assert!(content.contains("a.txt changed on disk"));
        assert!(content.contains("[Ctrl+G] reload"));
        assert_eq!(buf.cell((0, 0)).unwrap().bg, palette::YELLOW);
    }

    #[test]
    fn zero_area_does_not_panic() {
        let area = Rect::new(0, 0, 0, 0);
        let mut buf = Buffer::empty(area);
        StatusBarWidget::new("/path", "info").render(area, &mut buf);
    }
}
