//! Markdown rendering.
//!
//! The renderer is pure: it accepts markdown input, produces deterministic
//! sanitized HTML and surfaces structured errors.

mod config;
mod highlight;
mod service;

use thiserror::Error;

pub use highlight::HighlighterRegistry;
pub use service::MarkdownRenderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markdown rendering failed: {message}")]
    Markdown { message: String },
    #[error("syntax highlighting failed: {language}: {message}")]
    Highlighting { language: String, message: String },
    #[error("syntax pack could not be loaded: {message}")]
    SyntaxPack { message: String },
}

/// Markdown renderer used by the pipeline. Implementations must be pure and
/// deterministic: given the same input, they return identical output.
pub trait RenderService: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String, RenderError>;
}
