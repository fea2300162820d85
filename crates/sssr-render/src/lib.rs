//! wgpu backend for sssr-rs.
//!
//! [`SsrRenderer`] records a frame with [`sssr_core::StochasticReflections`]
//! and replays the resulting command list on the GPU through [`WgpuExecutor`].
//! Every kernel and blit pass has a WGSL counterpart under `shaders/` that
//! mirrors the CPU reference executor of `sssr-core`.

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod context;
pub mod error;
pub mod executor;
pub mod pipelines;
pub mod pool;
pub mod renderer;
pub mod textures;
pub mod transfer;

pub use context::GpuContext;
pub use error::{RenderError, RenderResult};
pub use executor::{HostTextures, WgpuExecutor};
pub use pipelines::SsrPipelines;
pub use pool::TexturePool;
pub use renderer::SsrRenderer;
pub use textures::GpuTexture;
pub use transfer::{create_texture, read_texture};
