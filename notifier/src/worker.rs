//! Assembly and lifetime of the notification consumer

use std::future::Future;
use std::sync::Arc;

use vouch_core::services::{EmailSenderTrait, NotificationHandler, TemplateRendererTrait};
use vouch_infra::{BuiltinTemplateRenderer, InfrastructureError};
use tokio_util::sync::CancellationToken;
use vouch_queue::{ConnectionState, Consumer, MessageHandler, QueueError, Traced, Transport};
use vouch_shared::config::MailConfig;

/// Why the worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// A shutdown signal was received
    Shutdown,
    /// The transport was closed underneath the worker
    TransportClosed,
}

/// Build the message handler sending verification emails through `sender`
pub fn notification_handler<S, T>(
    sender: Arc<S>,
    renderer: Arc<T>,
    product_name: impl Into<String>,
) -> Arc<dyn MessageHandler>
where
    S: EmailSenderTrait + 'static,
    T: TemplateRendererTrait + 'static,
{
    Arc::new(Traced::new(
        "notification",
        NotificationHandler::new(sender, renderer, product_name),
    ))
}

/// Built-in templates, overridden by `template_dir` when configured
pub fn load_renderer(config: &MailConfig) -> Result<BuiltinTemplateRenderer, InfrastructureError> {
    let renderer = BuiltinTemplateRenderer::new();
    match config.template_dir.as_deref() {
        Some(dir) => {
            tracing::info!(template_dir = dir, "Loading email templates");
            renderer.load_dir(dir)
        }
        None => Ok(renderer),
    }
}

/// Keep the consumer running until `shutdown` resolves.
///
/// A consumer whose loops gave up is stopped and started again once the
/// transport is connected; the transport supervisor does the redialing.
/// In-flight handlers always finish before this returns.
pub async fn run_until(
    consumer: &Consumer,
    transport: &Transport,
    cancel: &CancellationToken,
    shutdown: impl Future<Output = ()>,
) -> Result<WorkerExit, QueueError> {
    tokio::pin!(shutdown);
    let mut state = transport.watch_state();
    let mut restarts: u32 = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, draining consumer");
                consumer.stop().await?;
                return Ok(WorkerExit::Shutdown);
            }
            _ = consumer.failed() => {}
        }

        if let Err(e) = consumer.stop().await {
            tracing::error!(error = %e, "Consumer failed, waiting for the broker");
        }

        loop {
            let current = *state.borrow_and_update();
            match current {
                ConnectionState::Closed => return Ok(WorkerExit::TransportClosed),
                ConnectionState::Connected => match consumer.start(cancel).await {
                    Ok(()) => break,
                    Err(QueueError::Closed) => return Ok(WorkerExit::TransportClosed),
                    Err(e) if e.is_connection_failure() => {
                        tracing::warn!(error = %e, "Consumer restart failed, retrying");
                        tokio::select! {
                            _ = &mut shutdown => return Ok(WorkerExit::Shutdown),
                            _ = tokio::time::sleep(transport.policy().interval) => {}
                        }
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                _ => {}
            }

            tokio::select! {
                _ = &mut shutdown => return Ok(WorkerExit::Shutdown),
                changed = state.changed() => {
                    if changed.is_err() {
                        return Ok(WorkerExit::TransportClosed);
                    }
                }
            }
        }

        restarts += 1;
        tracing::info!(restarts, "Consumer restarted");
    }
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C signal, initiating shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM signal, initiating shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_renderer_defaults_to_builtin_templates() {
        let renderer = load_renderer(&MailConfig::default()).unwrap();
        assert!(renderer.has_template("confirm-email"));
    }

    #[test]
    fn test_load_renderer_rejects_missing_dir() {
        let config = MailConfig {
            template_dir: Some("/nonexistent/vouch-templates".to_string()),
            ..MailConfig::default()
        };
        assert!(load_renderer(&config).is_err());
    }
}
