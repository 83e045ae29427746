use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

use vouch_api::{configure, AppState, HealthProbe};
use vouch_core::services::{OtpService, OtpServiceConfig, QueueNotificationPublisher};
use vouch_infra::cache::{RedisClient, RedisVerificationCache};
use vouch_infra::database::{DatabasePool, MySqlUserRepository};
use vouch_infra::security::BcryptPasswordHasher;
use vouch_queue::{Publisher, PublisherConfig, ReconnectPolicy, RedisStreamsBroker, Transport};
use vouch_shared::config::AppConfig;
use vouch_shared::logging;
use vouch_shared::utils::masking::mask_url;

type Cache = RedisVerificationCache;
type Users = MySqlUserRepository;
type Notifications = QueueNotificationPublisher;
type Hasher = BcryptPasswordHasher;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    logging::init(&config.logging);

    info!(
        environment = %config.environment,
        bind = %config.server.bind_address(),
        "Starting Vouch API server"
    );

    let database = DatabasePool::new(&config.database)
        .await
        .context("failed to connect to the database")?;
    database
        .run_migrations()
        .await
        .context("failed to run database migrations")?;
    let users = Arc::new(MySqlUserRepository::new(database.get_pool().clone()));

    let redis = RedisClient::new(config.cache.clone())
        .await
        .context("failed to connect to the verification cache")?;
    let cache = Arc::new(RedisVerificationCache::new(redis));

    info!(broker = %mask_url(&config.queue.url), destination = %config.queue.destination, "Connecting to the queue");
    let broker = RedisStreamsBroker::from_config(&config.queue).context("invalid queue URL")?;
    let transport = Transport::new(
        config.queue.connection_name.clone(),
        Arc::new(broker),
        ReconnectPolicy::from(&config.queue),
    );
    transport
        .connect()
        .await
        .context("failed to connect to the queue")?;

    let shutdown = CancellationToken::new();
    let supervisor = transport.spawn_supervisor(shutdown.clone());

    let publisher = Arc::new(Publisher::new(
        transport.clone(),
        PublisherConfig::from(&config.queue),
    ));
    let notifications = Arc::new(QueueNotificationPublisher::new(
        publisher,
        config.queue.destination.clone(),
    ));
    notifications
        .declare()
        .await
        .context("failed to declare the notification destination")?;

    let otp_service = Arc::new(OtpService::new(
        cache,
        users,
        notifications,
        Arc::new(BcryptPasswordHasher::default()),
        OtpServiceConfig::from(&config.otp),
    ));

    let state = web::Data::new(AppState::new(otp_service, shutdown.clone()));
    let probe = web::Data::new(HealthProbe::new(transport.clone()));

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(probe.clone())
            .wrap(TracingLogger::default())
            .configure(configure::<Cache, Users, Notifications, Hasher>)
    });
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    // actix-web installs its own SIGINT/SIGTERM handling and drains workers
    server
        .bind(config.server.bind_address())
        .with_context(|| format!("failed to bind {}", config.server.bind_address()))?
        .run()
        .await?;

    info!("HTTP server stopped, releasing connections");
    shutdown.cancel();
    if let Err(e) = transport.close().await {
        warn!(error = %e, "Queue transport was already closed");
    }
    if let Err(e) = supervisor.await {
        warn!(error = %e, "Transport supervisor panicked");
    }
    database.close().await;

    Ok(())
}
