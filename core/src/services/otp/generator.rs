//! One-time code derivation
//!
//! A code is the 6-digit TOTP-SHA1 of a random 20-byte secret, using the
//! cache TTL as the time step. Validation accepts the current and the
//! previous step so a code stays valid for its whole cache lifetime.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use constant_time_eq::constant_time_eq;
use rand::{rngs::OsRng, RngCore};
use totp_lite::{totp_custom, Sha1};

use crate::errors::{DomainError, DomainResult};

/// Digits in a user-facing code
pub const CODE_DIGITS: u32 = 6;

/// Random bytes per secret
pub const SECRET_BYTES: usize = 20;

/// A freshly generated code with the secret that validates it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedOtp {
    pub code: String,
    pub secret: String,
}

/// TOTP generator with a fixed time step
#[derive(Debug, Clone, Copy)]
pub struct OtpGenerator {
    step_seconds: u64,
}

impl OtpGenerator {
    pub fn new(step: Duration) -> Self {
        Self {
            step_seconds: step.as_secs().max(1),
        }
    }

    pub fn step_seconds(&self) -> u64 {
        self.step_seconds
    }

    /// Generate a new secret and its code for the current time
    pub fn generate(&self) -> DomainResult<GeneratedOtp> {
        Ok(self.generate_at(unix_now()?))
    }

    /// Generate a new secret and its code for `unix_seconds`
    pub fn generate_at(&self, unix_seconds: u64) -> GeneratedOtp {
        let mut secret = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut secret);

        GeneratedOtp {
            code: self.code_for(&secret, unix_seconds),
            secret: URL_SAFE_NO_PAD.encode(secret),
        }
    }

    /// Whether `secret` produces `code` now or in the previous step
    pub fn validate(&self, code: &str, secret: &str) -> DomainResult<bool> {
        Ok(self.validate_at(code, secret, unix_now()?))
    }

    pub fn validate_at(&self, code: &str, secret: &str, unix_seconds: u64) -> bool {
        if code.len() != CODE_DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }

        let Ok(secret) = URL_SAFE_NO_PAD.decode(secret) else {
            return false;
        };
        if secret.len() != SECRET_BYTES {
            return false;
        }

        let current = self.code_for(&secret, unix_seconds);
        let previous = self.code_for(&secret, unix_seconds.saturating_sub(self.step_seconds));

        // Evaluate both to keep timing independent of which window matched
        let matches_current = constant_time_eq(code.as_bytes(), current.as_bytes());
        let matches_previous = constant_time_eq(code.as_bytes(), previous.as_bytes());
        matches_current | matches_previous
    }

    fn code_for(&self, secret: &[u8], unix_seconds: u64) -> String {
        totp_custom::<Sha1>(self.step_seconds, CODE_DIGITS, secret, unix_seconds)
    }
}

fn unix_now() -> DomainResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| DomainError::internal(format!("System clock before UNIX epoch: {}", e)))
}
