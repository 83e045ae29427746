//! `{{Key}}` placeholder renderer
//!
//! Templates are plain HTML with `{{Name}}` placeholders. Every placeholder
//! must have a value; values are HTML-escaped on substitution.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, info};
use vouch_core::errors::NotificationError;
use vouch_core::services::{TemplateData, TemplateRendererTrait, CONFIRM_EMAIL_TEMPLATE};

use crate::InfrastructureError;

static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex is valid")
});

const CONFIRM_EMAIL_HTML: &str = include_str!("../../templates/confirm-email.html");

/// Renderer over an in-memory set of named templates
#[derive(Debug, Clone)]
pub struct BuiltinTemplateRenderer {
    templates: HashMap<String, String>,
}

impl Default for BuiltinTemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinTemplateRenderer {
    /// Renderer with the built-in `confirm-email` template
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        templates.insert(CONFIRM_EMAIL_TEMPLATE.to_string(), CONFIRM_EMAIL_HTML.to_string());
        Self { templates }
    }

    /// Renderer with no templates at all
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Register or replace a template
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    /// Override templates with every `<name>.html` file in `dir`
    pub fn load_dir(mut self, dir: impl AsRef<Path>) -> Result<Self, InfrastructureError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| {
            InfrastructureError::Template(format!("cannot read {}: {}", dir.display(), e))
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| InfrastructureError::Template(e.to_string()))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let source = std::fs::read_to_string(&path).map_err(|e| {
                InfrastructureError::Template(format!("cannot read {}: {}", path.display(), e))
            })?;
            info!(template = name, path = %path.display(), "Template loaded");
            self.templates.insert(name.to_string(), source);
        }

        Ok(self)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}

impl TemplateRendererTrait for BuiltinTemplateRenderer {
    fn render(&self, template: &str, data: &TemplateData) -> Result<String, NotificationError> {
        let source = self
            .templates
            .get(template)
            .ok_or_else(|| NotificationError::Template {
                message: format!("unknown template '{}'", template),
            })?;

        let mut missing: Option<String> = None;
        let rendered = PLACEHOLDER_REGEX.replace_all(source, |caps: &Captures| {
            let key = &caps[1];
            match data.get(key) {
                Some(value) => html_escape(value),
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });

        if let Some(key) = missing {
            return Err(NotificationError::Template {
                message: format!("template '{}' has no value for '{}'", template, key),
            });
        }

        debug!(template, bytes = rendered.len(), "Template rendered");
        Ok(rendered.into_owned())
    }
}

/// Escape text for inclusion in HTML content or a quoted attribute
pub fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
