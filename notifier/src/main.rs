use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vouch_infra::{LogEmailSender, SmtpEmailSender};
use vouch_notifier::{load_renderer, notification_handler, run_until, shutdown_signal, WorkerExit};
use vouch_queue::{Consumer, ConsumerConfig, ReconnectPolicy, RedisStreamsBroker, Transport};
use vouch_shared::config::AppConfig;
use vouch_shared::logging;
use vouch_shared::utils::masking::mask_url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    logging::init(&config.logging);

    info!(
        environment = %config.environment,
        destination = %config.queue.destination,
        dead_letter = ?config.queue.dead_letter,
        "Starting Vouch notification worker"
    );

    let renderer = Arc::new(load_renderer(&config.mail).context("failed to load email templates")?);
    let handler = if config.mail.smtp_enabled() {
        let sender = SmtpEmailSender::new(&config.mail).context("invalid SMTP configuration")?;
        info!(host = %config.mail.smtp_host, port = config.mail.smtp_port, "Delivering emails over SMTP");
        notification_handler(Arc::new(sender), renderer, config.mail.product_name.clone())
    } else {
        warn!("SMTP_HOST is not set, verification emails are only logged");
        notification_handler(
            Arc::new(LogEmailSender::new()),
            renderer,
            config.mail.product_name.clone(),
        )
    };

    info!(broker = %mask_url(&config.queue.url), "Connecting to the queue");
    let broker = RedisStreamsBroker::from_config(&config.queue).context("invalid queue URL")?;
    let transport = Transport::new(
        format!("{}-notifier", config.queue.connection_name),
        Arc::new(broker),
        ReconnectPolicy::from(&config.queue),
    );
    transport
        .connect()
        .await
        .context("failed to connect to the queue")?;

    let consumer = Consumer::new(
        transport.clone(),
        ConsumerConfig::from(&config.queue),
        handler,
    );
    let cancel = CancellationToken::new();
    let supervisor = transport.spawn_supervisor(cancel.clone());
    consumer
        .start(&cancel)
        .await
        .context("failed to start the notification consumer")?;

    let exit = run_until(&consumer, &transport, &cancel, shutdown_signal()).await;
    cancel.cancel();
    if let Err(e) = transport.close().await {
        warn!(error = %e, "Queue transport was already closed");
    }
    if let Err(e) = supervisor.await {
        warn!(error = %e, "Transport supervisor panicked");
    }

    match exit.context("notification consumer did not stop cleanly")? {
        WorkerExit::Shutdown => info!("Notification worker stopped"),
        WorkerExit::TransportClosed => warn!("Queue transport closed, notification worker stopped"),
    }
    Ok(())
}
