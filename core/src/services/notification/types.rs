//! Email types

use std::collections::BTreeMap;

/// Template used for verification emails
pub const CONFIRM_EMAIL_TEMPLATE: &str = "confirm-email";

/// Subject line of verification emails
pub const OTP_EMAIL_SUBJECT: &str = "OTP Request";

/// Values substituted into a template, keyed by placeholder name
pub type TemplateData = BTreeMap<String, String>;

/// A file attached to an outgoing email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// A fully rendered email ready for the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub subject: String,
    pub html_body: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub attachments: Vec<Attachment>,
}

impl OutgoingEmail {
    /// Email to a single recipient with no copies or attachments
    pub fn to_one(recipient: impl Into<String>, subject: impl Into<String>, html_body: String) -> Self {
        Self {
            subject: subject.into(),
            html_body,
            to: vec![recipient.into()],
            cc: Vec::new(),
            bcc: Vec::new(),
            attachments: Vec::new(),
        }
    }
}
