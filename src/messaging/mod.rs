pub mod channels;
pub mod notification;

pub use channels::{NotificationConsumer, Notifier, create_notification_channel};
pub use notification::{Notification, NotificationCategory, NotificationLevel};
