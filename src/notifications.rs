//! Dismissible toasts, some carrying an action the user can take.

use std::time::{Duration, Instant};

use crate::tabs::TabId;

/// Default time a plain notification stays visible.
pub const DEFAULT_TTL_SECS: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Follow-up offered alongside a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    /// Replace the tab's buffer with the current disk content.
    ReloadTab(TabId),
    /// Close a tab whose file was deleted.
    CloseTab(TabId),
    /// Re-establish a watch session that stopped.
    RestartWatch,
}

impl NotificationAction {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationAction::ReloadTab(_) => "reload",
            NotificationAction::CloseTab(_) => "close tab",
            NotificationAction::RestartWatch => "restart watcher",
        }
    }

    fn tab(&self) -> Option<TabId> {
        match self {
            NotificationAction::ReloadTab(id) | NotificationAction::CloseTab(id) => Some(*id),
            NotificationAction::RestartWatch => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub action: Option<NotificationAction>,
    pub created: Instant,
}

/// Queue of live notifications, newest last.
///
/// Plain notifications expire after the TTL. Ones with an action stay until
/// dismissed, acted on, or made obsolete by a newer notification with the
/// same action.
#[derive(Debug)]
pub struct NotificationCenter {
    items: Vec<Notification>,
    next_id: u64,
    ttl: Duration,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS))
    }
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            items: Vec::new(),
            next_id: 0,
            ttl,
        }
    }

    pub fn push(
        &mut self,
        level: NotificationLevel,
        message: impl Into<String>,
        action: Option<NotificationAction>,
    ) -> u64 {
        if let Some(action) = action {
            self.items.retain(|n| n.action != Some(action));
        }
        self.next_id += 1;
        self.items.push(Notification {
            id: self.next_id,
            level,
            message: message.into(),
            action,
            created: Instant::now(),
        });
        self.next_id
    }

    pub fn info(&mut self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Info, message, None)
    }

    pub fn warn(&mut self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Warning, message, None)
    }

    pub fn error(&mut self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Error, message, None)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Newest notification, if any.
    pub fn latest(&self) -> Option<&Notification> {
        self.items.last()
    }

    /// Newest notification that carries an action.
    pub fn latest_actionable(&self) -> Option<&Notification> {
        self.items.iter().rev().find(|n| n.action.is_some())
    }

    pub fn dismiss(&mut self, id: u64) -> Option<Notification> {
        let pos = self.items.iter().position(|n| n.id == id)?;
        Some(self.items.remove(pos))
    }

    /// Drop every notification whose action targets `tab`.
    pub fn dismiss_for_tab(&mut self, tab: TabId) {
        self.items
            .retain(|n| n.action.and_then(|a| a.tab()) != Some(tab));
    }

    /// Drop plain notifications older than the TTL as of `now`.
    pub fn expire(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.items
            .retain(|n| n.action.is_some() || now.saturating_duration_since(n.created) < ttl);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_notifications_expire() {
        let mut center = NotificationCenter::new(Duration::from_secs(4));
        center.info("saved");
        center.push(
            NotificationLevel::Warning,
            "a.txt changed on disk",
            Some(NotificationAction::ReloadTab(TabId(1))),
        );
        center.expire(Instant::now() + Duration::from_secs(5));
        assert_eq!(center.len(), 1);
        assert!(center.latest().unwrap().action.is_some());
    }

    #[test]
    fn same_action_replaces_previous() {
        let mut center = NotificationCenter::default();
        let action = Some(NotificationAction::ReloadTab(TabId(1)));
        center.push(NotificationLevel::Warning, "first", action);
        center.push(NotificationLevel::Warning, "second", action);
        assert_eq!(center.len(), 1);
        assert_eq!(center.latest().unwrap().message, "second");
    }

    #[test]
    fn dismiss_for_tab_removes_both_kinds() {
        let mut center = NotificationCenter::default();
        center.push(NotificationLevel::Warning, "r", Some(NotificationAction::ReloadTab(TabId(1))));
        center.push(NotificationLevel::Warning, "c", Some(NotificationAction::CloseTab(TabId(1))));
        center.push(NotificationLevel::Warning, "w", Some(NotificationAction::RestartWatch));
        center.dismiss_for_tab(TabId(1));
        assert_eq!(center.len(), 1);
        assert_eq!(center.latest_actionable().unwrap().action, Some(NotificationAction::RestartWatch));
    }

    #[test]
    fn dismiss_by_id() {
        let mut center = NotificationCenter::default();
        let id = center.error("boom");
        assert!(center.dismiss(id).is_some());
        assert!(center.dismiss(id).is_none());
        assert!(center.is_empty());
    }
}
