//! Notification message handler

use std::sync::Arc;

use async_trait::async_trait;
use vouch_queue::{HandlerError, Message, MessageHandler};
use vouch_shared::utils::masking::mask_email;

use crate::domain::entities::NotificationEvent;
use crate::errors::NotificationError;

use super::traits::{EmailSenderTrait, TemplateRendererTrait};
use super::types::{OutgoingEmail, TemplateData, CONFIRM_EMAIL_TEMPLATE, OTP_EMAIL_SUBJECT};

/// Consumes notification events and sends verification emails
///
/// Malformed payloads fail permanently (dead-lettered, never requeued);
/// template and sender failures are transient and requeue the message.
pub struct NotificationHandler<S, T>
where
    S: EmailSenderTrait,
    T: TemplateRendererTrait,
{
    sender: Arc<S>,
    renderer: Arc<T>,
    product_name: String,
}

impl<S, T> NotificationHandler<S, T>
where
    S: EmailSenderTrait,
    T: TemplateRendererTrait,
{
    pub fn new(sender: Arc<S>, renderer: Arc<T>, product_name: impl Into<String>) -> Self {
        Self {
            sender,
            renderer,
            product_name: product_name.into(),
        }
    }

    /// Decode, render and send one notification event
    pub async fn handle_notification(&self, payload: &[u8]) -> Result<(), NotificationError> {
        let event = NotificationEvent::from_payload(payload).map_err(|e| {
            NotificationError::MalformedPayload {
                reason: e.to_string(),
            }
        })?;

        if event.email.trim().is_empty() || event.code.trim().is_empty() {
            return Err(NotificationError::MalformedPayload {
                reason: "email and otp_code are required".to_string(),
            });
        }

        let email = self.render(&event)?;
        self.sender.send(&email).await?;

        tracing::info!(
            email = %mask_email(&event.email),
            event = "otp_email_sent",
            "Verification email sent"
        );
        Ok(())
    }

    fn render(&self, event: &NotificationEvent) -> Result<OutgoingEmail, NotificationError> {
        let data: TemplateData = [
            ("Product", self.product_name.as_str()),
            ("OTPCode", event.code.as_str()),
            ("URL", event.verification_url.as_str()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

        let body = self.renderer.render(CONFIRM_EMAIL_TEMPLATE, &data)?;
        Ok(OutgoingEmail::to_one(event.email.clone(), OTP_EMAIL_SUBJECT, body))
    }
}

#[async_trait]
impl<S, T> MessageHandler for NotificationHandler<S, T>
where
    S: EmailSenderTrait,
    T: TemplateRendererTrait,
{
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        self.handle_notification(message.body())
            .await
            .map_err(|e| {
                tracing::warn!(
                    redelivered = message.is_redelivered(),
                    error = %e,
                    event = "notification_failed",
                    "Failed to deliver verification email"
                );
                if e.is_permanent() {
                    HandlerError::permanent(e)
                } else {
                    HandlerError::transient(e)
                }
            })
    }
}
