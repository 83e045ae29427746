//! Error types for the verification workflow and notification delivery

use thiserror::Error;

/// Outcomes of the OTP workflow that are returned to the caller as-is
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    /// No pending code under this value, or it already expired
    #[error("OTP code not found or expired")]
    NotFound,

    /// A pending record exists but its secret does not validate the code
    #[error("Invalid OTP code")]
    InvalidCode,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("Email is already registered")]
    EmailAlreadyRegistered,
}

/// Failures while turning a notification event into a sent email
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Malformed notification payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("Template rendering failed: {message}")]
    Template { message: String },

    #[error("Email delivery failed: {message}")]
    Delivery { message: String },

    /// The relay refused the message with a 5xx reply
    #[error("Email rejected by relay: {message}")]
    Rejected { message: String },
}

impl NotificationError {
    /// Redelivery can never fix this failure
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            NotificationError::MalformedPayload { .. } | NotificationError::Rejected { .. }
        )
    }
}
