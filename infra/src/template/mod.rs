//! Template module - email body rendering

pub mod renderer;


pub use renderer::{html_escape, BuiltinTemplateRenderer};
