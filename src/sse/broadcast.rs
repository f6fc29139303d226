//! Broadcast API
//!
//! The only surface the rest of the platform uses to push events at
//! connected clients. Delivery is strictly best-effort and fire-and-forget:
//! no retry, no queueing, no acknowledgment. Callers cannot observe whether
//! a write reached the client, only whether the user had an open stream at
//! the time (via the status endpoints).

use std::sync::Arc;
use uuid::Uuid;

use super::registry::{ConnectionRegistry, DispatchOutcome};
use super::StreamEvent;
use crate::fanout::EventFanout;
use crate::metrics;
use crate::models::{Notification, OrgId, UserId};

#[derive(Clone)]
pub struct Broadcaster {
    registry: ConnectionRegistry,
    fanout: Option<Arc<dyn EventFanout>>,
}

impl Broadcaster {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self {
            registry,
            fanout: None,
        }
    }

    /// Attach a cross-instance fan-out layer. Without one, delivery is
    /// limited to streams open on this process.
    pub fn with_fanout(mut self, fanout: Arc<dyn EventFanout>) -> Self {
        self.fanout = Some(fanout);
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Push a `new_notification` event to one user, if connected here.
    pub async fn broadcast_notification(&self, user_id: &UserId, notification: Notification) {
        let event = StreamEvent::new_notification(notification);
        self.deliver(user_id, &event);
        self.publish_user(user_id, &event).await;
    }

    /// Push a `new_notification` event to every connected user.
    ///
    /// TODO: scope delivery to members of `org_id` once a membership lookup
    /// is available from the identity service; today every user with an
    /// open stream receives the event regardless of syndicate.
    pub async fn broadcast_to_organization(&self, org_id: &OrgId, notification: Notification) {
        let event = StreamEvent::new_notification(notification);
        let users = self.registry.user_ids();
        tracing::debug!(org = %org_id, recipients = users.len(), "org broadcast");

        for user_id in &users {
            self.deliver(user_id, &event);
        }
        self.publish_all(&event).await;
    }

    /// Push a `notification_read` event to one user, if connected here.
    pub async fn broadcast_read_status(&self, user_id: &UserId, notification_id: Uuid) {
        let event = StreamEvent::notification_read(notification_id);
        self.deliver(user_id, &event);
        self.publish_user(user_id, &event).await;
    }

    /// One local write. A failure evicts that connection and is logged;
    /// it never reaches the caller or other recipients.
    fn deliver(&self, user_id: &UserId, event: &StreamEvent) {
        match self.registry.dispatch(user_id, event.clone()) {
            DispatchOutcome::Delivered => {
                metrics::event_sent(event.event_type());
            }
            DispatchOutcome::NotConnected => {
                // offline user; they will see the notification on next fetch
            }
            DispatchOutcome::Failed => {
                metrics::connection_dropped();
                tracing::warn!(
                    user = %user_id,
                    event = event.event_type(),
                    "write to stream failed, connection deregistered"
                );
            }
        }
    }

    async fn publish_user(&self, user_id: &UserId, event: &StreamEvent) {
        if let Some(fanout) = &self.fanout {
            if let Err(e) = fanout.publish_to_user(user_id, event).await {
                tracing::warn!(user = %user_id, error = %e, "fanout publish failed");
            }
        }
    }

    async fn publish_all(&self, event: &StreamEvent) {
        if let Some(fanout) = &self.fanout {
            if let Err(e) = fanout.publish_to_all(event).await {
                tracing::warn!(error = %e, "fanout publish failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationKind, NotificationPriority};
    use tokio::sync::mpsc;

    fn notification_for(user: &UserId) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_id: user.clone(),
            org_id: OrgId::new("org_1"),
            kind: NotificationKind::TicketUpdate,
            title: "Ticket #7".to_string(),
            body: "Status changed to resolved".to_string(),
            link: Some("/tickets/7".to_string()),
            metadata: None,
            priority: NotificationPriority::Normal,
            is_read: false,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_to_offline_user_is_silent() {
        let broadcaster = Broadcaster::new(ConnectionRegistry::new());
        let user = UserId::new("offline");
        // must not panic, error, or register anything
        broadcaster
            .broadcast_notification(&user, notification_for(&user))
            .await;
        assert_eq!(broadcaster.registry().connected_users(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_notification_reaches_connected_user() {
        let registry = ConnectionRegistry::new();
        let broadcaster = Broadcaster::new(registry.clone());
        let user = UserId::new("user_1");
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.add(user.clone(), tx);

        let notification = notification_for(&user);
        broadcaster
            .broadcast_notification(&user, notification.clone())
            .await;

        match rx.recv().await {
            Some(StreamEvent::NewNotification { notification: n, .. }) => {
                assert_eq!(n.id, notification.id)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_status_targets_one_user() {
        let registry = ConnectionRegistry::new();
        let broadcaster = Broadcaster::new(registry.clone());
        let reader = UserId::new("reader");
        let bystander = UserId::new("bystander");
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.add(reader.clone(), tx1);
        registry.add(bystander.clone(), tx2);

        let notification_id = Uuid::new_v4();
        broadcaster
            .broadcast_read_status(&reader, notification_id)
            .await;

        match rx1.try_recv() {
            Ok(StreamEvent::NotificationRead {
                notification_id: id,
                ..
            }) => assert_eq!(id, notification_id),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_org_broadcast_isolates_failing_recipient() {
        let registry = ConnectionRegistry::new();
        let broadcaster = Broadcaster::new(registry.clone());

        let mut receivers = Vec::new();
        for name in ["user_1", "user_2", "user_3"] {
            let (tx, rx) = mpsc::unbounded_channel();
            registry.add(UserId::new(name), tx);
            receivers.push((UserId::new(name), rx));
        }

        // kill user_2's channel
        let dead = receivers.remove(1);
        drop(dead.1);

        let org = OrgId::new("org_1");
        broadcaster
            .broadcast_to_organization(&org, notification_for(&UserId::new("user_1")))
            .await;

        // survivors still got the event
        for (user, rx) in receivers.iter_mut() {
            match rx.try_recv() {
                Ok(StreamEvent::NewNotification { .. }) => {}
                other => panic!("{} missed the event: {:?}", user, other),
            }
        }

        // the dead connection was deregistered, the rest kept
        assert!(!registry.is_connected(&dead.0));
        assert_eq!(registry.connected_users(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_after_teardown_is_noop() {
        let registry = ConnectionRegistry::new();
        let broadcaster = Broadcaster::new(registry.clone());
        let user = UserId::new("user_1");
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.add(user.clone(), tx);

        drop(rx);
        registry.remove_if(&user, id);

        broadcaster
            .broadcast_notification(&user, notification_for(&user))
            .await;
        assert!(!registry.is_connected(&user));
    }
}
