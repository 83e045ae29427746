//! Request and response bodies of the user-service routes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "fullname must be 1-100 characters"))]
    pub fullname: String,

    #[validate(email(message = "email format is invalid"))]
    pub email: String,

    /// Plain password; bcrypt ignores bytes past 72
    #[validate(length(min = 8, max = 72, message = "password must be 8-72 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RequestOtpRequest {
    #[validate(email(message = "email format is invalid"))]
    pub email: String,
}

/// Query string of the verification link
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VerifyOtpQuery {
    #[validate(length(min = 1, max = 16, message = "otp_code is required"))]
    pub otp_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
    /// False when the verification email could not be queued; the client
    /// should call request-otp to resend
    pub notification_queued: bool,
    pub otp_expires_at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOtpResponse {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpResponse {
    pub email: String,
    pub verified: bool,
    pub message: String,
}
