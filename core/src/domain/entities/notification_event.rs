//! "Send verification email" event carried over the queue.

use serde::{Deserialize, Serialize};

/// Payload handed from the OTP workflow to the notification worker
///
/// Exists only in transit as a serialized message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub email: String,

    #[serde(rename = "otp_code")]
    pub code: String,

    /// Link that redeems the code in one click
    #[serde(rename = "url")]
    pub verification_url: String,
}

impl NotificationEvent {
    pub fn new(
        email: impl Into<String>,
        code: impl Into<String>,
        verification_url: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            code: code.into(),
            verification_url: verification_url.into(),
        }
    }

    /// Serialize into a queue message body
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse a queue message body
    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
