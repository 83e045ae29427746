//! One-time code configuration

use serde::{Deserialize, Serialize};

use super::{env_or, env_string};

/// Lifetime of pending codes and the link embedded in notification emails
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OtpConfig {
    /// Seconds a pending code stays redeemable
    pub ttl_seconds: u64,

    /// Base URL of the verification endpoint; the code is appended as `otp_code`
    pub verification_base_url: String,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            verification_base_url: String::from(
                "http://localhost:8080/api/user-service/verify-otp",
            ),
        }
    }
}

impl OtpConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl_seconds: env_or("OTP_TTL_SECONDS", defaults.ttl_seconds).max(1),
            verification_base_url: env_string(
                "OTP_VERIFICATION_BASE_URL",
                &defaults.verification_base_url,
            ),
        }
    }
}
