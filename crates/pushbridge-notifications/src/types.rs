//! Notification value types shared by the router and the platform seam.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of a background fetch, reported back to the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchResult {
    /// New content was downloaded.
    NewData,
    /// Nothing new. Also the fallback for unknown tokens.
    #[default]
    NoData,
    /// The fetch failed.
    Failed,
}

/// Content of a delivered native notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationContent {
    /// Alert title.
    pub title: Option<String>,
    /// Alert subtitle.
    pub subtitle: Option<String>,
    /// Alert body.
    pub body: Option<String>,
    /// Category the notification was posted with.
    pub category_identifier: Option<String>,
    /// Grouping thread.
    pub thread_identifier: Option<String>,
    /// Badge value carried by the notification.
    pub badge: Option<i64>,
    /// Custom payload keys.
    pub user_info: Map<String, Value>,
}

/// A native notification object (delivered or presented).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeNotification {
    /// Request identifier.
    pub identifier: String,
    /// Delivery time.
    pub date: Option<DateTime<Utc>>,
    /// Content.
    pub content: NotificationContent,
}

impl NativeNotification {
    /// True when the object carries nothing worth forwarding.
    pub fn is_empty(&self) -> bool {
        let c = &self.content;
        self.identifier.is_empty()
            && self.date.is_none()
            && c.title.is_none()
            && c.subtitle.is_none()
            && c.body.is_none()
            && c.category_identifier.is_none()
            && c.thread_identifier.is_none()
            && c.badge.is_none()
            && c.user_info.is_empty()
    }
}

/// The user's response to a notification (modern API).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationResponse {
    /// Chosen action identifier.
    pub action_identifier: String,
    /// The notification responded to.
    pub notification: NativeNotification,
    /// Typed text for text-input actions.
    pub user_text: Option<String>,
}
