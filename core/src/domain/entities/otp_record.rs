//! Pending one-time code stored in the verification cache.

use serde::{Deserialize, Serialize};

/// A pending OTP awaiting redemption
///
/// Lives in the verification cache from creation until it is redeemed or
/// its TTL elapses. Never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRecord {
    /// Address the code was issued for
    pub email: String,

    /// User-facing code, also the cache key
    #[serde(rename = "otp_code")]
    pub code: String,

    /// Seed that deterministically validates `code`
    pub secret: String,
}

impl OtpRecord {
    pub fn new(email: impl Into<String>, code: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            code: code.into(),
            secret: secret.into(),
        }
    }
}
