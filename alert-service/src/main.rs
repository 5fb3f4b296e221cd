use std::io;
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use redis_utils::RedisPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_webpush_shared::{PushTransport, VapidConfig, WebPushTransport};

use alert_service::config::StorageBackend;
use alert_service::handlers::{register_dispatch, register_preferences, register_subscriptions};
use alert_service::metrics;
use alert_service::repository::postgres::PostgresStore;
use alert_service::repository::redis::RedisStore;
use alert_service::repository::{DedupLedger, DeliveryStats, SubscriptionRepository};
use alert_service::services::DispatchEngine;
use alert_service::Config;

fn fatal(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::Other, message)
}

type Backends = (
    Arc<dyn SubscriptionRepository>,
    Arc<dyn DedupLedger>,
    Arc<dyn DeliveryStats>,
);

async fn build_backends(config: &Config) -> io::Result<Backends> {
    match config.storage.backend {
        StorageBackend::Redis => {
            let pool = RedisPool::connect(&config.storage.redis_url)
                .await
                .map_err(|e| fatal(format!("Redis connection failed: {e}")))?;
            tracing::info!("Using Redis subscription storage");

            let store = Arc::new(RedisStore::new(pool.manager()));
            Ok((
                store.clone() as Arc<dyn SubscriptionRepository>,
                store.clone() as Arc<dyn DedupLedger>,
                store as Arc<dyn DeliveryStats>,
            ))
        }
        StorageBackend::Postgres => {
            let database_url = config
                .storage
                .database_url
                .as_deref()
                .ok_or_else(|| fatal("DATABASE_URL is required for the postgres backend".into()))?;

            let pool = PgPoolOptions::new()
                .max_connections(config.storage.database_max_connections)
                .connect(database_url)
                .await
                .map_err(|e| fatal(format!("Database connection failed: {e}")))?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| fatal(format!("Database migration failed: {e}")))?;
            tracing::info!("Using Postgres subscription storage");

            let store = Arc::new(PostgresStore::new(pool));
            Ok((
                store.clone() as Arc<dyn SubscriptionRepository>,
                store.clone() as Arc<dyn DedupLedger>,
                store as Arc<dyn DeliveryStats>,
            ))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting alert service");

    let config = Config::from_env().map_err(|e| fatal(e.to_string()))?;

    let (repository, ledger, stats) = build_backends(&config).await?;

    let transport: Arc<dyn PushTransport> = Arc::new(
        WebPushTransport::new(VapidConfig::new(
            config.push.vapid_subject.clone(),
            config.push.vapid_private_key.clone(),
        ))
        .map_err(|e| fatal(format!("Push transport initialization failed: {e}")))?,
    );

    let engine = Arc::new(
        DispatchEngine::new(repository.clone(), ledger, stats, transport)
            .with_batch_size(config.push.batch_size)
            .with_refresh_on_send(config.push.refresh_on_send),
    );

    let addr = format!("0.0.0.0:{}", config.app.port);
    tracing::info!("Starting HTTP server on {}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(repository.clone()))
            .app_data(web::Data::new(engine.clone()))
            .app_data(web::Data::new(config.clone()))
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .route("/", web::get().to(|| async { "Vigil Alert Service" }))
            .configure(|cfg| {
                register_subscriptions(cfg);
                register_preferences(cfg);
                register_dispatch(cfg);
            })
    })
    .bind(&addr)?
    .run()
    .await
}
