//! # Vouch Notifier
//!
//! Worker process that consumes "send verification email" events and
//! delivers them through SMTP, or to the log when no relay is configured.

pub mod worker;

pub use worker::{load_renderer, notification_handler, run_until, shutdown_signal, WorkerExit};
