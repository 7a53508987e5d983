//! Notification System
//!
//! The gateway reports user-visible failures through a [`Notifier`]. The
//! default [`NotificationCenter`] keeps a bounded history and mirrors every
//! entry into the log.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Category of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyLevel {
    Error,
    Info,
    Success,
    Warning,
}

impl NotifyLevel {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "success" => Self::Success,
            "warning" | "warn" => Self::Warning,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Error => "✗",
            Self::Info => "ℹ",
            Self::Success => "✓",
            Self::Warning => "!",
        }
    }
}

/// Receives user-facing messages
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotifyLevel, message: &str);
}

/// A single notification
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotifyLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotifyLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    /// Format notification for one-line display
    pub fn display(&self) -> String {
        format!(
            "{} [{}] {}",
            self.level.icon(),
            self.created_at.format("%H:%M:%S"),
            self.message
        )
    }
}

/// Notification history (most recent first)
pub struct NotificationCenter {
    notifications: Mutex<VecDeque<Notification>>,
    max_history: usize,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::with_capacity(50)
    }

    pub fn with_capacity(max_history: usize) -> Self {
        Self {
            notifications: Mutex::new(VecDeque::new()),
            max_history,
        }
    }

    /// Record a notification and return its id
    pub fn push(&self, level: NotifyLevel, message: &str) -> Uuid {
        let notification = Notification::new(level, message);
        let id = notification.id;

        match level {
            NotifyLevel::Error => tracing::error!("{}", message),
            NotifyLevel::Warning => tracing::warn!("{}", message),
            NotifyLevel::Info | NotifyLevel::Success => tracing::info!("{}", message),
        }

        let mut notifications = self.lock();
        notifications.push_front(notification);
        while notifications.len() > self.max_history {
            notifications.pop_back();
        }
        id
    }

    /// Snapshot of the history, newest first
    pub fn recent(&self) -> Vec<Notification> {
        self.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Notification> {
        self.lock().front().cloned()
    }

    pub fn count(&self, level: NotifyLevel) -> usize {
        self.lock().iter().filter(|n| n.level == level).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Notification>> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, level: NotifyLevel, message: &str) {
        self.push(level, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_newest_first() {
        let center = NotificationCenter::new();
        center.notify(NotifyLevel::Info, "first");
        center.notify(NotifyLevel::Error, "second");

        let recent = center.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "second");
        assert_eq!(center.latest().unwrap().level, NotifyLevel::Error);
        assert_eq!(center.count(NotifyLevel::Error), 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let center = NotificationCenter::with_capacity(3);
        for i in 0..10 {
            center.notify(NotifyLevel::Warning, &format!("msg {}", i));
        }
        assert_eq!(center.len(), 3);
        assert_eq!(center.latest().unwrap().message, "msg 9");

        center.clear();
        assert!(center.is_empty());
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!(NotifyLevel::from_str("ERROR"), NotifyLevel::Error);
        assert_eq!(NotifyLevel::from_str("warn"), NotifyLevel::Warning);
        assert_eq!(NotifyLevel::from_str("whatever"), NotifyLevel::Info);
        assert_eq!(NotifyLevel::Success.as_str(), "success");
    }

    #[test]
    fn test_display_contains_message() {
        let notification = Notification::new(NotifyLevel::Success, "saved");
        let line = notification.display();
        assert!(line.starts_with("✓"));
        assert!(line.ends_with("saved"));
    }
}
