// Notifications - Report channel for errors recovered inside the core

use std::time::{SystemTime, UNIX_EPOCH};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Subsystem that raised the notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    /// Pattern ticks and transport
    Scheduling,
    /// Chain building and live graph topology
    Routing,
    /// Parameter edits and live parameter pushes
    Params,
    Persistence,
    Generic,
}

/// Notification with timestamp and metadata
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: NotificationCategory,
    pub message: String,
    pub timestamp: u64, // Unix timestamp in milliseconds
}

impl Notification {
    pub fn new(level: NotificationLevel, category: NotificationCategory, message: String) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            level,
            category,
            message,
            timestamp,
        }
    }

    pub fn info(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Info, category, message)
    }

    pub fn warning(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Warning, category, message)
    }

    pub fn error(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Error, category, message)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_creation() {
        let notif = Notification::error(
            NotificationCategory::Routing,
            "Output missing".to_string(),
        );

        assert_eq!(notif.level, NotificationLevel::Error);
        assert_eq!(notif.category, NotificationCategory::Routing);
        assert_eq!(notif.message, "Output missing");
        assert!(notif.timestamp > 0);
    }

    #[test]
    fn test_notification_helpers() {
        let info = Notification::info(NotificationCategory::Scheduling, "Info".to_string());
        let warning = Notification::warning(NotificationCategory::Params, "Warning".to_string());
        let error = Notification::error(NotificationCategory::Persistence, "Error".to_string());

        assert_eq!(info.level, NotificationLevel::Info);
        assert_eq!(warning.level, NotificationLevel::Warning);
        assert_eq!(error.level, NotificationLevel::Error);
    }

}
