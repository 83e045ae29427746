//! SMTP email sender built on lettre
//!
//! Port 465 uses implicit TLS, every other port upgrades with STARTTLS.
//! Addresses that cannot be parsed are reported as malformed payloads: no
//! amount of redelivery fixes them.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};
use vouch_core::errors::NotificationError;
use vouch_core::services::{EmailSenderTrait, OutgoingEmail};
use vouch_shared::config::MailConfig;
use vouch_shared::utils::masking::mask_email;

use crate::InfrastructureError;

/// Port that expects TLS from the first byte
const IMPLICIT_TLS_PORT: u16 = 465;

/// Email sender relaying through an SMTP server
#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// Build the sender from mail configuration; no connection is made yet
    pub fn new(config: &MailConfig) -> Result<Self, InfrastructureError> {
        let address: Address = config.from_address.parse().map_err(|e| {
            InfrastructureError::Config(format!(
                "Invalid sender address '{}': {}",
                config.from_address, e
            ))
        })?;
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        let relay = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        };
        let builder = relay
            .map_err(|e| InfrastructureError::Mail(format!("Invalid SMTP relay: {}", e)))?
            .port(config.smtp_port);

        let builder = if config.smtp_username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
        };

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            from = %mask_email(&config.from_address),
            "SMTP sender configured"
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Open a connection to the relay and close it again
    pub async fn test_connection(&self) -> Result<bool, InfrastructureError> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| InfrastructureError::Mail(e.to_string()))
    }
}

/// Assemble a MIME message for `email`
pub(crate) fn compose(from: &Mailbox, email: &OutgoingEmail) -> Result<Message, NotificationError> {
    if email.to.is_empty() {
        return Err(NotificationError::MalformedPayload {
            reason: "email has no recipients".to_string(),
        });
    }

    let mut builder = Message::builder()
        .from(from.clone())
        .subject(email.subject.clone());
    for to in &email.to {
        builder = builder.to(parse_mailbox(to)?);
    }
    for cc in &email.cc {
        builder = builder.cc(parse_mailbox(cc)?);
    }
    for bcc in &email.bcc {
        builder = builder.bcc(parse_mailbox(bcc)?);
    }

    let message = if email.attachments.is_empty() {
        builder
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
    } else {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::html(email.html_body.clone()));
        for attachment in &email.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                NotificationError::MalformedPayload {
                    reason: format!(
                        "attachment '{}' has invalid content type: {}",
                        attachment.filename, e
                    ),
                }
            })?;
            parts = parts.singlepart(
                MailAttachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }
        builder.multipart(parts)
    };

    message.map_err(|e| NotificationError::MalformedPayload {
        reason: format!("message could not be built: {}", e),
    })
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotificationError> {
    address
        .parse()
        .map_err(|e| NotificationError::MalformedPayload {
            reason: format!("invalid address '{}': {}", mask_email(address), e),
        })
}

#[async_trait]
impl EmailSenderTrait for SmtpEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotificationError> {
        let message = compose(&self.from, email)?;

        match self.transport.send(message).await {
            Ok(response) => {
                info!(
                    event = "email_sent",
                    recipients = email.to.len(),
                    code = %response.code(),
                    "Email accepted by relay"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    event = "email_failed",
                    recipients = email.to.len(),
                    permanent = e.is_permanent(),
                    error = %e,
                    "SMTP delivery failed"
                );
                Err(send_failure(e.is_permanent(), e.to_string()))
            }
        }
    }
}

/// Permanent relay replies must not be retried; everything else may succeed later
pub(crate) fn send_failure(permanent: bool, message: String) -> NotificationError {
    if permanent {
        NotificationError::Rejected { message }
    } else {
        NotificationError::Delivery { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_core::services::Attachment;

    fn sender_mailbox() -> Mailbox {
        "Vouch <no-reply@vouch.local>".parse().unwrap()
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8(message.formatted()).unwrap()
    }

    #[test]
    fn test_compose_single_recipient_html() {
        let email = OutgoingEmail::to_one(
            "jane@example.com",
            "OTP Request",
            "<p>Your code is 123456</p>".to_string(),
        );

        let message = compose(&sender_mailbox(), &email).unwrap();
        let raw = formatted(&message);

        assert!(raw.contains("Subject: OTP Request"));
        assert!(raw.contains("To: jane@example.com"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("Your code is 123456"));
    }

    #[test]
    fn test_compose_envelope_includes_copies() {
        let mut email = OutgoingEmail::to_one("jane@example.com", "OTP Request", "<p>hi</p>".to_string());
        email.cc.push("audit@example.com".to_string());
        email.bcc.push("hidden@example.com".to_string());

        let message = compose(&sender_mailbox(), &email).unwrap();
        let recipients: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(|address| address.to_string())
            .collect();

        assert_eq!(recipients.len(), 3);
        assert!(recipients.contains(&"hidden@example.com".to_string()));
        assert!(!formatted(&message).contains("hidden@example.com"));
    }

    #[test]
    fn test_compose_with_attachment_is_multipart() {
        let mut email = OutgoingEmail::to_one("jane@example.com", "OTP Request", "<p>hi</p>".to_string());
        email.attachments.push(Attachment {
            filename: "terms.txt".to_string(),
            content_type: "text/plain".to_string(),
            content: b"terms".to_vec(),
        });

        let raw = formatted(&compose(&sender_mailbox(), &email).unwrap());

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("terms.txt"));
    }

    #[test]
    fn test_compose_rejects_invalid_address() {
        let email = OutgoingEmail::to_one("not-an-address", "OTP Request", "<p>hi</p>".to_string());

        let result = compose(&sender_mailbox(), &email);
        assert!(matches!(result, Err(NotificationError::MalformedPayload { .. })));
    }

    #[test]
    fn test_compose_rejects_empty_recipients() {
        let mut email = OutgoingEmail::to_one("jane@example.com", "OTP Request", String::new());
        email.to.clear();

        let result = compose(&sender_mailbox(), &email);
        assert!(matches!(result, Err(NotificationError::MalformedPayload { .. })));
    }

    #[test]
    fn test_new_rejects_invalid_sender() {
        let config = MailConfig {
            smtp_host: "smtp.example.com".to_string(),
            from_address: "nobody".to_string(),
            ..MailConfig::default()
        };

        assert!(matches!(
            SmtpEmailSender::new(&config),
            Err(InfrastructureError::Config(_))
        ));
    }

    #[test]
    fn test_send_failure_classifies_relay_replies() {
        let rejected = send_failure(true, "550 mailbox unavailable".into());
        assert!(matches!(rejected, NotificationError::Rejected { .. }));
        assert!(rejected.is_permanent());

        let busy = send_failure(false, "421 service not available".into());
        assert!(matches!(busy, NotificationError::Delivery { .. }));
        assert!(!busy.is_permanent());
    }
}
