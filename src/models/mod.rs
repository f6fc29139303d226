use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque user identifier issued by the external identity provider.
///
/// The delivery service never parses or interprets this value; it is only
/// used as a routing key and must be treated as an arbitrary string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque organization (syndicate) identifier, also provider-issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(pub String);

impl OrgId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happened on the platform to produce this notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A helpdesk ticket changed status or was assigned
    TicketUpdate,
    /// Someone commented on a helpdesk ticket
    TicketComment,
    /// A syndicate-wide announcement was published
    Announcement,
    /// A charge or assessment is due
    PaymentReminder,
    /// A document was shared with the resident
    DocumentShared,
    /// Platform-generated notice
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TicketUpdate => "ticket_update",
            NotificationKind::TicketComment => "ticket_comment",
            NotificationKind::Announcement => "announcement",
            NotificationKind::PaymentReminder => "payment_reminder",
            NotificationKind::DocumentShared => "document_shared",
            NotificationKind::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        }
    }
}

/// A notification record as produced by the rest of the platform.
///
/// The delivery service relays these as opaque payloads; it does not read
/// or write the notification store. Persistence, preferences, and digests
/// are other services' concerns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,

    /// Recipient user
    pub recipient_id: UserId,

    /// Tenant (syndicate) the notification belongs to
    pub org_id: OrgId,

    pub kind: NotificationKind,

    pub title: String,

    pub body: String,

    /// Optional in-app destination (ticket page, announcement page, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Custom data as JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    #[serde(default = "default_priority")]
    pub priority: NotificationPriority,

    #[serde(default)]
    pub is_read: bool,

    #[serde(default = "default_created_at")]
    pub created_at: DateTime<Utc>,
}

fn default_priority() -> NotificationPriority {
    NotificationPriority::Normal
}

fn default_created_at() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_kind_serialization() {
        let kinds = vec![
            NotificationKind::TicketUpdate,
            NotificationKind::TicketComment,
            NotificationKind::Announcement,
            NotificationKind::PaymentReminder,
            NotificationKind::DocumentShared,
            NotificationKind::System,
        ];

        for kind in kinds {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            let deserialized: NotificationKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, deserialized);
        }
    }

    #[test]
    fn test_priority_ordering() {
        assert!(NotificationPriority::Low < NotificationPriority::Normal);
        assert!(NotificationPriority::Normal < NotificationPriority::High);
    }

    #[test]
    fn test_user_id_is_opaque_string() {
        // provider-issued ids are not UUIDs; they must survive untouched
        let id = UserId::new("user_2aBcD3fGhI");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"user_2aBcD3fGhI\"");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_notification_defaults_on_deserialize() {
        let user_id = UserId::new("user_1");
        let payload = serde_json::json!({
            "id": Uuid::new_v4(),
            "recipient_id": user_id,
            "org_id": "org_1",
            "kind": "ticket_update",
            "title": "Ticket #42 updated",
            "body": "Your elevator maintenance ticket moved to in progress",
        });

        let notification: Notification = serde_json::from_value(payload).unwrap();
        assert_eq!(notification.recipient_id, user_id);
        assert_eq!(notification.priority, NotificationPriority::Normal);
        assert!(!notification.is_read);
        assert!(notification.link.is_none());
    }
}
