//! Connection registry
//!
//! Process-wide routing table from user id to the send half of that user's
//! open event stream. The stream endpoint owns the receive half; the
//! registry only dispatches. At most one entry exists per user: a second
//! connection for the same user takes over the slot, and the displaced
//! channel is left for its own endpoint to tear down.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::StreamEvent;
use crate::models::UserId;

/// Send half of a stream's event channel
pub type EventSender = mpsc::UnboundedSender<StreamEvent>;

/// Identity of one physical connection.
///
/// Stamped at registration so that teardown of a displaced connection
/// cannot evict the connection that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

struct Connection {
    id: ConnectionId,
    sender: EventSender,
}

/// Outcome of a single dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Event queued on the user's channel
    Delivered,
    /// User has no open stream; the normal offline case, not an error
    NotConnected,
    /// Channel was closed on the far end; the entry has been evicted
    Failed,
}

/// Registry of active stream connections.
///
/// Cheap to clone; all clones share the same map. Entry operations are
/// atomic per user, which keeps a broadcast's send-then-evict sequence
/// from racing a concurrent replacement for the same user.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<UserId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `user_id`. Always succeeds.
    ///
    /// A previous channel for the user becomes unreachable through the
    /// registry but is not closed here; its endpoint notices on its own.
    pub fn add(&self, user_id: UserId, sender: EventSender) -> ConnectionId {
        let id = ConnectionId::new();
        let previous = self.connections.insert(user_id.clone(), Connection { id, sender });
        if previous.is_some() {
            tracing::debug!(user = %user_id, "replaced existing stream connection");
        }
        id
    }

    /// Delete the entry for `user_id` if present; no-op otherwise.
    pub fn remove(&self, user_id: &UserId) {
        self.connections.remove(user_id);
    }

    /// Delete the entry only while it still belongs to `connection_id`.
    ///
    /// Returns whether an entry was removed. Used by stream teardown so a
    /// stale connection cannot evict its replacement.
    pub fn remove_if(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        self.connections
            .remove_if(user_id, |_, conn| conn.id == connection_id)
            .is_some()
    }

    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.connections.contains_key(user_id)
    }

    pub fn connected_users(&self) -> usize {
        self.connections.len()
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Write one event to the user's channel, evicting the entry when the
    /// far end is gone. Never fails from the caller's point of view.
    pub fn dispatch(&self, user_id: &UserId, event: StreamEvent) -> DispatchOutcome {
        let stale = match self.connections.get(user_id) {
            Some(conn) => {
                if conn.sender.send(event).is_ok() {
                    return DispatchOutcome::Delivered;
                }
                conn.id
            }
            None => return DispatchOutcome::NotConnected,
        };

        // The guard is dropped above; evict unless the slot was already
        // taken over by a newer connection.
        self.connections.remove_if(user_id, |_, conn| conn.id == stale);
        tracing::debug!(user = %user_id, "dropped dead stream connection");
        DispatchOutcome::Failed
    }
}
