//! Configuration for the OTP workflow

use std::time::Duration;

use vouch_shared::config::OtpConfig;

/// Attempts at finding a code that is not pending for someone else
pub const DEFAULT_ISSUE_ATTEMPTS: u32 = 5;

/// Configuration for the OTP service
#[derive(Debug, Clone)]
pub struct OtpServiceConfig {
    /// Lifetime of a pending code, also the TOTP time step
    pub ttl: Duration,
    /// Verification endpoint; the code is appended as `otp_code`
    pub verification_base_url: String,
    /// Bounded retries when a freshly generated code collides
    pub issue_attempts: u32,
}

impl Default for OtpServiceConfig {
    fn default() -> Self {
        Self::from(&OtpConfig::default())
    }
}

impl From<&OtpConfig> for OtpServiceConfig {
    fn from(config: &OtpConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.ttl_seconds.max(1)),
            verification_base_url: config.verification_base_url.clone(),
            issue_attempts: DEFAULT_ISSUE_ATTEMPTS,
        }
    }
}

impl OtpServiceConfig {
    /// Link that redeems `code`
    pub fn verification_url(&self, code: &str) -> String {
        let separator = if self.verification_base_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!("{}{}otp_code={}", self.verification_base_url, separator, code)
    }
}
