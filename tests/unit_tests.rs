/// Unit tests for syndic-notify core functionality
///
/// This test module covers:
/// - Notification model serialization/deserialization
/// - Stream event wire format
/// - Token claims handling
use chrono::Utc;
use serde_json::json;
use syndic_notify::models::*;
use syndic_notify::sse::StreamEvent;
use uuid::Uuid;

fn sample_notification() -> Notification {
    Notification {
        id: Uuid::new_v4(),
        recipient_id: UserId::new("user_2aBcD3fGhI"),
        org_id: OrgId::new("org_residence-lumiere"),
        kind: NotificationKind::TicketUpdate,
        title: "Ticket #128 updated".to_string(),
        body: "Your heating ticket was assigned to a contractor".to_string(),
        link: Some("/helpdesk/tickets/128".to_string()),
        metadata: Some(json!({"ticket_id": 128, "status": "assigned"})),
        priority: NotificationPriority::Normal,
        is_read: false,
        created_at: Utc::now(),
    }
}

#[test]
fn test_notification_round_trip() {
    let notification = sample_notification();
    let json = serde_json::to_string(&notification).unwrap();
    let back: Notification = serde_json::from_str(&json).unwrap();

    assert_eq!(back.id, notification.id);
    assert_eq!(back.recipient_id, notification.recipient_id);
    assert_eq!(back.org_id, notification.org_id);
    assert_eq!(back.kind, notification.kind);
    assert_eq!(back.metadata, notification.metadata);
}

#[test]
fn test_notification_kind_wire_names() {
    for (kind, wire) in [
        (NotificationKind::TicketUpdate, "\"ticket_update\""),
        (NotificationKind::TicketComment, "\"ticket_comment\""),
        (NotificationKind::Announcement, "\"announcement\""),
        (NotificationKind::PaymentReminder, "\"payment_reminder\""),
        (NotificationKind::DocumentShared, "\"document_shared\""),
        (NotificationKind::System, "\"system\""),
    ] {
        assert_eq!(serde_json::to_string(&kind).unwrap(), wire);
    }
}

#[test]
fn test_minimal_push_payload_parses() {
    // what a relay caller actually sends: no priority, no read flag
    let payload = json!({
        "id": Uuid::new_v4(),
        "recipient_id": "user_1",
        "org_id": "org_1",
        "kind": "announcement",
        "title": "AGM minutes available",
        "body": "The minutes from last week's meeting were published",
    });

    let notification: Notification = serde_json::from_value(payload).unwrap();
    assert_eq!(notification.priority, NotificationPriority::Normal);
    assert!(!notification.is_read);
}

#[test]
fn test_stream_event_frames_match_client_contract() {
    let frame = StreamEvent::connected().to_frame().unwrap();
    assert!(frame.starts_with("data: "));
    assert!(frame.ends_with("\n\n"));

    let json_part = frame
        .strip_prefix("data: ")
        .and_then(|s| s.strip_suffix("\n\n"))
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(json_part).unwrap();
    assert_eq!(value["type"], "connected");
    assert!(value["timestamp"].is_i64());
}

#[test]
fn test_new_notification_event_embeds_record() {
    let notification = sample_notification();
    let frame = StreamEvent::new_notification(notification.clone())
        .to_frame()
        .unwrap();
    let json_part = frame
        .strip_prefix("data: ")
        .and_then(|s| s.strip_suffix("\n\n"))
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(json_part).unwrap();

    assert_eq!(value["type"], "new_notification");
    assert_eq!(
        value["notification"]["id"],
        notification.id.to_string()
    );
    assert_eq!(value["notification"]["kind"], "ticket_update");
}

#[test]
fn test_notification_read_event_key() {
    let id = Uuid::new_v4();
    let frame = StreamEvent::notification_read(id).to_frame().unwrap();
    let json_part = frame
        .strip_prefix("data: ")
        .and_then(|s| s.strip_suffix("\n\n"))
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(json_part).unwrap();

    assert_eq!(value["type"], "notification_read");
    assert_eq!(value["notificationId"], id.to_string());
}
