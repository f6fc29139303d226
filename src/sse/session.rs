//! Stream session lifecycle
//!
//! One session per accepted stream request: register the channel, queue the
//! initial `connected` event, drive heartbeats, and tear everything down
//! when the client goes away. Teardown runs when the response body is
//! dropped (client abort) and again, harmlessly, if a later write fails;
//! both paths are guarded by the connection id so a reconnected user's new
//! session is never evicted by the old one.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use actix_web::web::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::registry::{ConnectionId, ConnectionRegistry};
use super::StreamEvent;
use crate::metrics;
use crate::models::UserId;

/// Streaming response body for one client connection.
///
/// Yields SSE frames as they are queued on the session's channel. Dropping
/// the stream (actix does this when the client disconnects) aborts the
/// heartbeat task and deregisters the connection.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    registry: ConnectionRegistry,
    user_id: UserId,
    connection_id: ConnectionId,
    heartbeat: Option<JoinHandle<()>>,
}

/// Open a session for `user_id`: register the channel, queue the immediate
/// `connected` event, and start the heartbeat.
pub fn open(
    registry: &ConnectionRegistry,
    user_id: UserId,
    heartbeat_period: Duration,
) -> EventStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection_id = registry.add(user_id.clone(), tx.clone());

    // Queued before the body is first polled, so the client always sees
    // `connected` as the first frame.
    let _ = tx.send(StreamEvent::connected());
    metrics::event_sent("connected");
    metrics::connection_opened();

    let heartbeat = tokio::spawn(heartbeat_loop(
        registry.clone(),
        user_id.clone(),
        connection_id,
        tx,
        heartbeat_period,
    ));

    tracing::debug!(user = %user_id, "stream connected");

    EventStream {
        rx,
        registry: registry.clone(),
        user_id,
        connection_id,
        heartbeat: Some(heartbeat),
    }
}

/// Emit a heartbeat every `period` until the channel dies.
///
/// A failed send means the receiver is gone; the fallback deregistration
/// here covers the case where the body was dropped without its `Drop`
/// running to completion first. Removing an already-removed entry is a
/// tolerated no-op.
async fn heartbeat_loop(
    registry: ConnectionRegistry,
    user_id: UserId,
    connection_id: ConnectionId,
    tx: mpsc::UnboundedSender<StreamEvent>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately; skip it so heartbeats start
    // one full period after `connected`
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if tx.send(StreamEvent::heartbeat()).is_err() {
            registry.remove_if(&user_id, connection_id);
            tracing::debug!(user = %user_id, "heartbeat failed, stream deregistered");
            break;
        }
        metrics::event_sent("heartbeat");
    }
}

impl Stream for EventStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => match event.to_frame() {
                Ok(frame) => Poll::Ready(Some(Ok(Bytes::from(frame)))),
                Err(e) => {
                    tracing::error!(user = %this.user_id, error = %e, "failed to encode stream event");
                    Poll::Ready(None)
                }
            },
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        if self.registry.remove_if(&self.user_id, self.connection_id) {
            tracing::debug!(user = %self.user_id, "stream disconnected");
        }
        metrics::connection_closed();
    }
}
