//! Error types for sssr-rs.

use thiserror::Error;

/// The main error type for sssr-core operations.
#[derive(Error, Debug)]
pub enum SsrError {
    /// A configuration value is outside its documented range.
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// A dispatch was recorded without a texture in a slot its kernel reads or writes.
    #[error("kernel '{kernel}' has no texture bound to slot '{slot}'")]
    MissingBinding {
        kernel: &'static str,
        slot: &'static str,
    },

    /// A command referenced a texture the executor does not know about.
    #[error("unknown texture: {0}")]
    UnknownTexture(String),

    /// A transient resource was used outside its acquire/release window.
    #[error("transient resource lifetime violation: {0}")]
    ResourceLifetime(String),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for sssr-core operations.
pub type Result<T> = std::result::Result<T, SsrError>;
