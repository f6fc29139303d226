//! The notification stream endpoint
//!
//! Endpoint: GET /api/v1/notifications/stream
//!
//! A long-lived response: the connection stays open until the client
//! disconnects, receiving `connected` immediately, `heartbeat` on a fixed
//! cadence, and whatever the broadcast API pushes in between. Cross-origin
//! reads are allowed for this route only, and only for GET.

use actix_cors::Cors;
use actix_web::{http::header, web, HttpResponse};
use std::time::Duration;

use crate::config::Config;
use crate::middleware::{Identity, JwtAuth};
use crate::sse::{self, ConnectionRegistry};

pub async fn notification_stream(
    identity: Identity,
    registry: web::Data<ConnectionRegistry>,
    config: web::Data<Config>,
) -> HttpResponse {
    let stream = sse::open(
        registry.get_ref(),
        identity.user_id,
        Duration::from_secs(config.stream.heartbeat_secs),
    );

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(stream)
}

/// Register the stream route.
///
/// Wrap order matters: CORS must sit outside auth so preflight requests
/// are answered without a token.
pub fn register_routes(cfg: &mut web::ServiceConfig, auth: JwtAuth) {
    let cors = Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT])
        .max_age(3600);

    cfg.service(
        web::resource("/api/v1/notifications/stream")
            .wrap(auth)
            .wrap(cors)
            .route(web::get().to(notification_stream)),
    );
}
