//! Business services containing domain logic and use cases.

pub mod notification;
pub mod otp;

// Re-export commonly used types
pub use notification::{
    Attachment, EmailSenderTrait, NotificationHandler, OutgoingEmail, TemplateData,
    TemplateRendererTrait, CONFIRM_EMAIL_TEMPLATE, OTP_EMAIL_SUBJECT,
};
pub use otp::{
    NotificationPublisherTrait, OtpGenerator, OtpService, OtpServiceConfig,
    PasswordHasherTrait, QueueNotificationPublisher, VerificationCacheTrait,
};
