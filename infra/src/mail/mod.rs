//! Mail module - outbound email transports
//!
//! `SmtpEmailSender` relays through an SMTP server with lettre.
//! `LogEmailSender` only logs, for local runs without a relay.

pub mod log_sender;
pub mod smtp;

pub use log_sender::LogEmailSender;
pub use smtp::SmtpEmailSender;
