//! Cross-instance event fan-out
//!
//! The connection registry is per-process, so a horizontally scaled
//! deployment needs a shared broadcast layer between instances: each
//! instance publishes the events it originates and applies the events its
//! peers publish to its own local registry. This module defines that
//! collaborator interface and a Redis pub/sub implementation of it.
//!
//! The layer is optional. Without it the service is single-instance and
//! the broadcast API delivers to local streams only.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::UserId;
use crate::sse::{ConnectionRegistry, StreamEvent};

/// Channel prefix for user-targeted events; the user id is appended.
const USER_CHANNEL_PREFIX: &str = "notify:user:";
/// Channel for events addressed to every connected user.
const ALL_CHANNEL: &str = "notify:all";
/// Pattern covering both, for the subscriber side.
const CHANNEL_PATTERN: &str = "notify:*";

/// Publishing side of the fan-out collaborator.
#[async_trait]
pub trait EventFanout: Send + Sync {
    async fn publish_to_user(&self, user_id: &UserId, event: &StreamEvent) -> Result<()>;
    async fn publish_to_all(&self, event: &StreamEvent) -> Result<()>;
}

/// What travels between instances.
///
/// `instance_id` lets a subscriber skip envelopes it published itself;
/// the originating instance already delivered to its local streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutEnvelope {
    pub instance_id: Uuid,
    pub user_id: Option<UserId>,
    pub event: StreamEvent,
}

#[derive(Clone)]
pub struct RedisEventFanout {
    conn: ConnectionManager,
    instance_id: Uuid,
}

impl RedisEventFanout {
    pub async fn connect(redis_url: &str, instance_id: Uuid) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn, instance_id })
    }

    fn user_channel(user_id: &UserId) -> String {
        format!("{}{}", USER_CHANNEL_PREFIX, user_id)
    }

    async fn publish(&self, channel: &str, envelope: &FanoutEnvelope) -> Result<()> {
        let payload = serde_json::to_string(envelope)?;
        let mut conn = self.conn.clone();
        let receivers: usize = conn.publish(channel, payload).await?;
        tracing::debug!(channel, receivers, "published fanout envelope");
        Ok(())
    }
}

#[async_trait]
impl EventFanout for RedisEventFanout {
    async fn publish_to_user(&self, user_id: &UserId, event: &StreamEvent) -> Result<()> {
        let envelope = FanoutEnvelope {
            instance_id: self.instance_id,
            user_id: Some(user_id.clone()),
            event: event.clone(),
        };
        self.publish(&Self::user_channel(user_id), &envelope).await
    }

    async fn publish_to_all(&self, event: &StreamEvent) -> Result<()> {
        let envelope = FanoutEnvelope {
            instance_id: self.instance_id,
            user_id: None,
            event: event.clone(),
        };
        self.publish(ALL_CHANNEL, &envelope).await
    }
}

/// Subscribe to peer instances and feed their events into the local
/// registry. Runs until the pub/sub connection ends; the caller decides
/// whether to restart it.
pub async fn run_listener(
    redis_url: &str,
    instance_id: Uuid,
    registry: ConnectionRegistry,
) -> Result<()> {
    let client = Client::open(redis_url)?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(CHANNEL_PATTERN).await?;

    tracing::info!(pattern = CHANNEL_PATTERN, "subscribed to fanout events");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload = match msg.get_payload::<String>() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable fanout payload");
                continue;
            }
        };

        let envelope: FanoutEnvelope = match serde_json::from_str(&payload) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, payload = %payload, "undecodable fanout envelope");
                continue;
            }
        };

        if envelope.instance_id == instance_id {
            continue;
        }

        match envelope.user_id {
            Some(user_id) => {
                registry.dispatch(&user_id, envelope.event);
            }
            None => {
                for user_id in registry.user_ids() {
                    registry.dispatch(&user_id, envelope.event.clone());
                }
            }
        }
    }

    tracing::warn!("fanout subscription ended");
    Ok(())
}
