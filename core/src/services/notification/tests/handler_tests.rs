//! Unit tests for the notification handler

use std::sync::Arc;

use vouch_queue::{HandlerError, Message, MessageHandler};

use crate::domain::entities::NotificationEvent;
use crate::errors::NotificationError;
use crate::services::notification::{NotificationHandler, CONFIRM_EMAIL_TEMPLATE, OTP_EMAIL_SUBJECT};

use super::mocks::{MockEmailSender, MockTemplateRenderer};

fn handler(
    sender: Arc<MockEmailSender>,
    renderer: Arc<MockTemplateRenderer>,
) -> NotificationHandler<MockEmailSender, MockTemplateRenderer> {
    NotificationHandler::new(sender, renderer, "Mata Duitan")
}

fn payload() -> Vec<u8> {
    NotificationEvent::new(
        "a@b.com",
        "123456",
        "http://localhost:8080/api/user-service/verify-otp?otp_code=123456",
    )
    .to_payload()
    .unwrap()
}

#[tokio::test]
async fn test_event_is_rendered_and_sent() {
    let sender = Arc::new(MockEmailSender::new(false));
    let renderer = Arc::new(MockTemplateRenderer::new(false));
    let handler = handler(sender.clone(), renderer.clone());

    handler.handle_notification(&payload()).await.unwrap();

    let (template, data) = renderer.calls().remove(0);
    assert_eq!(template, CONFIRM_EMAIL_TEMPLATE);
    assert_eq!(data["Product"], "Mata Duitan");
    assert_eq!(data["OTPCode"], "123456");
    assert_eq!(
        data["URL"],
        "http://localhost:8080/api/user-service/verify-otp?otp_code=123456"
    );

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, OTP_EMAIL_SUBJECT);
    assert_eq!(sent[0].to, vec!["a@b.com".to_string()]);
    assert!(sent[0].cc.is_empty());
    assert!(sent[0].bcc.is_empty());
    assert!(sent[0].attachments.is_empty());
    assert_eq!(sent[0].html_body, "<p>Mata Duitan code 123456</p>");
}

#[tokio::test]
async fn test_malformed_payload_is_permanent() {
    let sender = Arc::new(MockEmailSender::new(false));
    let handler = handler(sender.clone(), Arc::new(MockTemplateRenderer::new(false)));

    let err = handler.handle_notification(b"{not json").await.unwrap_err();
    assert!(matches!(err, NotificationError::MalformedPayload { .. }));

    let message = Message::new("mailQueue", b"{not json".to_vec(), false);
    let outcome = handler.handle(&message).await.unwrap_err();
    assert!(matches!(outcome, HandlerError::Permanent(_)));
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn test_missing_fields_are_malformed() {
    let handler = handler(
        Arc::new(MockEmailSender::new(false)),
        Arc::new(MockTemplateRenderer::new(false)),
    );
    let payload = br#"{"email":"","otp_code":"123456","url":"http://x"}"#;

    let err = handler.handle_notification(payload).await.unwrap_err();
    assert!(err.is_permanent());
}

#[tokio::test]
async fn test_sender_failure_requeues() {
    let handler = handler(
        Arc::new(MockEmailSender::new(true)),
        Arc::new(MockTemplateRenderer::new(false)),
    );

    let message = Message::new("mailQueue", payload(), false);
    let outcome = handler.handle(&message).await.unwrap_err();
    assert!(matches!(outcome, HandlerError::Transient(_)));
    assert!(outcome.requeue());
}

#[tokio::test]
async fn test_relay_rejection_is_permanent() {
    let handler = handler(
        Arc::new(MockEmailSender::rejecting()),
        Arc::new(MockTemplateRenderer::new(false)),
    );

    let message = Message::new("mailQueue", payload(), false);
    let outcome = handler.handle(&message).await.unwrap_err();
    assert!(matches!(outcome, HandlerError::Permanent(_)));
    assert!(!outcome.requeue());
}

#[tokio::test]
async fn test_template_failure_requeues_without_sending() {
    let sender = Arc::new(MockEmailSender::new(false));
    let handler = handler(sender.clone(), Arc::new(MockTemplateRenderer::new(true)));

    let message = Message::new("mailQueue", payload(), true);
    let outcome = handler.handle(&message).await.unwrap_err();
    assert!(outcome.requeue());
    assert!(sender.sent().is_empty());
}
