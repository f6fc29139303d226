//! Event types pushed over the notification stream
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Notification;

/// Events emitted on a user's stream, in the shape clients parse.
///
/// Every variant carries an epoch-millisecond timestamp stamped at
/// construction time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Sent once, immediately after the stream is accepted
    Connected { timestamp: i64 },

    /// Periodic liveness ping; also keeps proxies from idling out the
    /// connection
    Heartbeat { timestamp: i64 },

    /// A notification was produced for the connected user
    NewNotification {
        notification: Notification,
        timestamp: i64,
    },

    /// The user read a notification on another device or tab
    NotificationRead {
        #[serde(rename = "notificationId")]
        notification_id: Uuid,
        timestamp: i64,
    },
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl StreamEvent {
    pub fn connected() -> Self {
        StreamEvent::Connected {
            timestamp: now_ms(),
        }
    }

    pub fn heartbeat() -> Self {
        StreamEvent::Heartbeat {
            timestamp: now_ms(),
        }
    }

    pub fn new_notification(notification: Notification) -> Self {
        StreamEvent::NewNotification {
            notification,
            timestamp: now_ms(),
        }
    }

    pub fn notification_read(notification_id: Uuid) -> Self {
        StreamEvent::NotificationRead {
            notification_id,
            timestamp: now_ms(),
        }
    }

    /// Label used for logs and metrics
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::Heartbeat { .. } => "heartbeat",
            StreamEvent::NewNotification { .. } => "new_notification",
            StreamEvent::NotificationRead { .. } => "notification_read",
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            StreamEvent::Connected { timestamp }
            | StreamEvent::Heartbeat { timestamp }
            | StreamEvent::NewNotification { timestamp, .. }
            | StreamEvent::NotificationRead { timestamp, .. } => *timestamp,
        }
    }

    /// Render the event as one SSE frame: a `data: ` line with the JSON
    /// payload, terminated by a blank line.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
