//! Mail delivery configuration

use serde::{Deserialize, Serialize};

use super::{env_or, env_string};

/// SMTP settings for the notification worker
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    /// SMTP relay host; empty means emails are only logged
    pub smtp_host: String,

    /// SMTP relay port
    pub smtp_port: u16,

    /// SMTP username (empty for no authentication)
    #[serde(default)]
    pub smtp_username: String,

    /// SMTP password (empty for no authentication)
    #[serde(default)]
    pub smtp_password: String,

    /// Display name of the sender
    pub from_name: String,

    /// Address of the sender
    pub from_address: String,

    /// Product name shown in rendered emails
    pub product_name: String,

    /// Directory of `<name>.html` templates overriding the built-in ones
    #[serde(default)]
    pub template_dir: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_name: String::from("Vouch"),
            from_address: String::from("no-reply@vouch.local"),
            product_name: String::from("Mata Duitan"),
            template_dir: None,
        }
    }
}

impl MailConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            smtp_host: env_string("SMTP_HOST", &defaults.smtp_host),
            smtp_port: env_or("SMTP_PORT", defaults.smtp_port),
            smtp_username: env_string("SMTP_USERNAME", ""),
            smtp_password: env_string("SMTP_PASSWORD", ""),
            from_name: env_string("SMTP_FROM_NAME", &defaults.from_name),
            from_address: env_string("SMTP_FROM_ADDRESS", &defaults.from_address),
            product_name: env_string("PRODUCT_NAME", &defaults.product_name),
            template_dir: std::env::var("MAIL_TEMPLATE_DIR").ok().filter(|d| !d.is_empty()),
        }
    }

    /// Whether an SMTP relay is configured
    pub fn smtp_enabled(&self) -> bool {
        !self.smtp_host.trim().is_empty()
    }
}
