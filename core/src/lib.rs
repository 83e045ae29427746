//! # Vouch Core
//!
//! Core business logic and domain layer for the Vouch verification service.
//! This crate contains domain entities, the OTP workflow, the notification
//! handler, repository interfaces and the error taxonomy that the API and
//! worker processes are built on.

pub mod domain;
pub mod errors;
pub mod repositories;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::*;
pub use errors::*;
pub use repositories::*;
pub use services::*;
