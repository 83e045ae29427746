//! Shared utilities and configuration for the Vouch services
//!
//! This crate provides common functionality used by every server module:
//! - Configuration types loaded from the environment
//! - Logging bootstrap for the binaries
//! - Utility functions (email validation, log masking)

pub mod config;
pub mod logging;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{
    AppConfig, CacheConfig, DatabaseConfig, Environment, LoggingConfig, MailConfig, OtpConfig,
    QueueConfig, ServerConfig,
};
pub use utils::{masking, validation};
