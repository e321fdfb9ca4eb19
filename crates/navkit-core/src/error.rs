//! Error types for NavKit

use thiserror::Error;

/// Result type alias for NavKit operations
pub type NavKitResult<T> = Result<T, NavKitError>;

/// Main error type for NavKit.
///
/// Policy evaluation itself never fails; these errors only surface at the
/// embedder boundary (presenting prompts) and while loading configuration.
/// Dispatch failures have their own type in the engine.
#[derive(Error, Debug)]
pub enum NavKitError {
    #[error("Presentation error: {0}")]
    Presentation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NavKitError {
    /// Create a new presentation error (a prompt could not be shown)
    pub fn presentation(msg: impl Into<String>) -> Self {
        Self::Presentation(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
