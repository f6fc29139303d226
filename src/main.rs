use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;
use syndic_notify::fanout::{self, RedisEventFanout};
use syndic_notify::handlers::{notifications, stream};
use syndic_notify::middleware::JwtAuth;
use syndic_notify::{logging, metrics, Broadcaster, Config, ConnectionRegistry};
use uuid::Uuid;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let config = Config::from_env()?;
    tracing::info!(env = %config.app.env, "starting syndic-notify");

    let registry = ConnectionRegistry::new();
    let instance_id = Uuid::new_v4();
    let mut broadcaster = Broadcaster::new(registry.clone());

    if let Some(redis) = &config.redis {
        let publisher = RedisEventFanout::connect(&redis.url, instance_id).await?;
        broadcaster = broadcaster.with_fanout(Arc::new(publisher));

        let listener_registry = registry.clone();
        let listener_url = redis.url.clone();
        tokio::spawn(async move {
            if let Err(e) = fanout::run_listener(&listener_url, instance_id, listener_registry).await
            {
                tracing::error!(error = %e, "fanout listener terminated");
            }
        });
        tracing::info!(%instance_id, "cross-instance fanout enabled");
    }

    let auth = JwtAuth::new(&config.auth.jwt_secret);
    let config_data = web::Data::new(config.clone());
    let registry_data = web::Data::new(registry);
    let broadcaster_data = web::Data::new(broadcaster);

    let addr = format!("0.0.0.0:{}", config.app.port);
    tracing::info!(%addr, "starting HTTP server");

    HttpServer::new(move || {
        let auth = auth.clone();
        App::new()
            .app_data(config_data.clone())
            .app_data(registry_data.clone())
            .app_data(broadcaster_data.clone())
            .wrap(Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(|cfg| {
                stream::register_routes(cfg, auth.clone());
                notifications::register_routes(cfg, auth);
            })
    })
    .bind(&addr)?
    .run()
    .await?;

    Ok(())
}
