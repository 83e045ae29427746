//! Email sender that writes to the log instead of a mail relay

use async_trait::async_trait;
use tracing::{debug, info};
use vouch_core::errors::NotificationError;
use vouch_core::services::{EmailSenderTrait, OutgoingEmail};
use vouch_shared::utils::masking::mask_email;

/// Logs each email and reports success
#[derive(Debug, Clone, Default)]
pub struct LogEmailSender;

impl LogEmailSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailSenderTrait for LogEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotificationError> {
        let recipients: Vec<String> = email.to.iter().map(|to| mask_email(to)).collect();

        info!(
            event = "email_logged",
            to = ?recipients,
            cc = email.cc.len(),
            bcc = email.bcc.len(),
            attachments = email.attachments.len(),
            subject = %email.subject,
            "SMTP disabled, email not sent"
        );
        debug!(body_len = email.html_body.len(), "Logged email body size");

        Ok(())
    }
}
