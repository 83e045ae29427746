//! Types for OTP workflow results

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Result of issuing a code
#[derive(Debug, Clone)]
pub struct OtpIssued {
    pub email: String,
    /// The pending code; never returned to HTTP clients
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a registration
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub user_id: Uuid,
    pub otp: OtpIssued,
    /// False when the notification event could not be published; the client
    /// can ask for a resend
    pub notification_queued: bool,
}
