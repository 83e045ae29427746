//! Notification delivery
//!
//! Turns "send verification email" events received from the queue into
//! rendered emails handed to an email sender.

mod handler;
mod traits;
mod types;

#[cfg(test)]
mod tests;

pub use handler::NotificationHandler;
pub use traits::{EmailSenderTrait, TemplateRendererTrait};
pub use types::{
    Attachment, OutgoingEmail, TemplateData, CONFIRM_EMAIL_TEMPLATE, OTP_EMAIL_SUBJECT,
};
