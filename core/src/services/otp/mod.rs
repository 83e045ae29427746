//! OTP verification workflow
//!
//! This module provides the email verification workflow:
//! - Code generation from a random secret (TOTP-SHA1)
//! - Time-boxed storage in the verification cache
//! - Hand-off of "send verification email" events to the queue
//! - Single-use redemption and confirmation of the user record

mod config;
mod generator;
mod publisher;
mod service;
mod traits;
mod types;

#[cfg(test)]
mod tests;

pub use config::OtpServiceConfig;
pub use generator::{GeneratedOtp, OtpGenerator, CODE_DIGITS, SECRET_BYTES};
pub use publisher::QueueNotificationPublisher;
pub use service::OtpService;
pub use traits::{NotificationPublisherTrait, PasswordHasherTrait, VerificationCacheTrait};
pub use types::{OtpIssued, RegistrationOutcome};
