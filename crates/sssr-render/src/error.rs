//! Rendering error types.

use sssr_core::SsrError;
use thiserror::Error;

/// Errors raised by the wgpu backend.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No adapter matched the request.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// The command list itself was rejected.
    #[error(transparent)]
    Core(#[from] SsrError),

    /// A pipeline for this pass was never built.
    #[error("no pipeline for {0}")]
    MissingPipeline(&'static str),

    #[error("texture {0} is not allocated")]
    MissingTexture(String),

    /// Readback only supports the effect's own float formats.
    #[error("unsupported readback format {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),

    #[error("buffer map failed")]
    BufferMapFailed,
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
