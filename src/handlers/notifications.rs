//! Relay and introspection endpoints
//!
//! How the rest of the platform reaches the broadcast API: a ticket
//! handler or announcement publisher POSTs an already-constructed
//! notification record here and it is pushed to whoever is connected.
//! Nothing is persisted; a push for an offline user is accepted and
//! dropped, which is the contract.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::middleware::JwtAuth;
use crate::models::{Notification, OrgId, UserId};
use crate::sse::{Broadcaster, ConnectionRegistry};

/// Push a notification to its recipient's open stream.
///
/// Endpoint: POST /api/v1/notifications/push
pub async fn push_notification(
    broadcaster: web::Data<Broadcaster>,
    registry: web::Data<ConnectionRegistry>,
    body: web::Json<Notification>,
) -> HttpResponse {
    let notification = body.into_inner();
    let recipient = notification.recipient_id.clone();
    let connected = registry.is_connected(&recipient);

    broadcaster
        .broadcast_notification(&recipient, notification)
        .await;

    HttpResponse::Ok().json(json!({
        "accepted": true,
        "recipient_id": recipient,
        "recipient_connected": connected,
    }))
}

/// Push a notification to every connected user of an organization.
///
/// Endpoint: POST /api/v1/notifications/push/org/{org_id}
pub async fn push_org_notification(
    path: web::Path<String>,
    broadcaster: web::Data<Broadcaster>,
    registry: web::Data<ConnectionRegistry>,
    body: web::Json<Notification>,
) -> HttpResponse {
    let org_id = OrgId::new(path.into_inner());
    let reached = registry.connected_users();

    broadcaster
        .broadcast_to_organization(&org_id, body.into_inner())
        .await;

    HttpResponse::Ok().json(json!({
        "accepted": true,
        "org_id": org_id,
        "connected_users": reached,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReadStatusRequest {
    pub user_id: UserId,
    pub notification_id: Uuid,
}

/// Tell a user's other tabs and devices that a notification was read.
///
/// Endpoint: POST /api/v1/notifications/read
pub async fn push_read_status(
    broadcaster: web::Data<Broadcaster>,
    body: web::Json<ReadStatusRequest>,
) -> HttpResponse {
    let request = body.into_inner();
    broadcaster
        .broadcast_read_status(&request.user_id, request.notification_id)
        .await;

    HttpResponse::Ok().json(json!({
        "accepted": true,
        "user_id": request.user_id,
        "notification_id": request.notification_id,
    }))
}

/// Whether a user currently has an open stream.
///
/// Endpoint: GET /api/v1/stream/status/{user_id}
pub async fn stream_status(
    path: web::Path<String>,
    registry: web::Data<ConnectionRegistry>,
) -> HttpResponse {
    let user_id = UserId::new(path.into_inner());
    HttpResponse::Ok().json(json!({
        "user_id": user_id,
        "connected": registry.is_connected(&user_id),
    }))
}

/// Connection totals for dashboards.
///
/// Endpoint: GET /api/v1/stream/stats
pub async fn stream_stats(registry: web::Data<ConnectionRegistry>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "connected_users": registry.connected_users(),
    }))
}

/// Register relay and introspection routes.
pub fn register_routes(cfg: &mut web::ServiceConfig, auth: JwtAuth) {
    cfg.service(
        web::scope("/api/v1/notifications")
            .wrap(auth.clone())
            .route("/push", web::post().to(push_notification))
            .route(
                "/push/org/{org_id}",
                web::post().to(push_org_notification),
            )
            .route("/read", web::post().to(push_read_status)),
    );
    cfg.service(
        web::scope("/api/v1/stream")
            .wrap(auth)
            .route("/status/{user_id}", web::get().to(stream_status))
            .route("/stats", web::get().to(stream_stats)),
    );
}
