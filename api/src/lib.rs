//! # Vouch API
//!
//! Thin actix-web surface over the OTP workflow: registration, code
//! requests and code redemption, plus a health probe.

pub mod app;
pub mod dto;
pub mod handlers;
pub mod routes;

pub use app::{configure, AppState, HealthProbe};
