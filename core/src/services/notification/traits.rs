//! Traits for email rendering and delivery

use async_trait::async_trait;

use crate::errors::NotificationError;

use super::types::{OutgoingEmail, TemplateData};

/// Outbound email transport
#[async_trait]
pub trait EmailSenderTrait: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotificationError>;
}

/// Renders named templates into HTML
pub trait TemplateRendererTrait: Send + Sync {
    fn render(&self, template: &str, data: &TemplateData) -> Result<String, NotificationError>;
}
