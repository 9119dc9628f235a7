//! Errors raised while loading or rendering templates

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThemeError {
    /// No directory for the requested theme under `theme.path`
    #[error("Theme not found: {0}")]
    NotFound(String),

    #[error("Template {0} is not valid UTF-8")]
    InvalidUtf8(String),

    /// Tera rejected the combined built-in and theme template set
    #[error("Failed to load templates: {0}")]
    Load(String),

    #[error("Failed to render '{template}': {message}")]
    Render { template: String, message: String },

    #[error("Invalid theme metadata: {0}")]
    InvalidMetadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
