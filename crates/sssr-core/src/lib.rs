//! Core of sssr-rs, a stochastic screen-space reflection pass for deferred renderers.
//!
//! This crate is backend independent. It provides:
//! - [`SsrConfig`] effect settings and the per-frame [`FrameParameters`] snapshot
//! - [`CameraFrame`] matrices for one or two eyes, including the previous view-projection
//! - The Halton jitter sequence, the feasibility gate, and the debug-view table
//! - [`StochasticReflections`], which records one frame into a [`CommandList`] of
//!   acquire/dispatch/copy/blit/release commands with scoped transient resources
//! - A CPU [`reference`] executor that runs a command list on in-memory images

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Parameter structs legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod camera;
pub mod color_pyramid;
pub mod commands;
pub mod composite;
pub mod config;
pub mod cost_map;
pub mod debug_view;
pub mod denoise;
pub mod depth_pyramid;
pub mod effect;
pub mod error;
pub mod extent;
pub mod gate;
pub mod jitter;
pub mod params;
pub mod raycast;
pub mod reference;
pub mod resolve;
pub mod scope;
pub mod state;
pub mod temporal;
pub mod uniforms;

pub use camera::{CameraFrame, CameraInput, EyeMatrices, EyeView, MAX_EYES};
pub use commands::{
    BlitPass, Bindings, Command, CommandList, HostTexture, Kernel, PersistentLayout,
    PersistentTexture, Slot, TexelFormat, TextureDesc, TextureRef, TransientId,
};
pub use config::{DebugPass, SsrConfig};
pub use debug_view::{DebugView, Intermediate};
pub use effect::{HostFrame, StochasticReflections};
pub use error::{Result, SsrError};
pub use extent::{
    Extent, FrameExtents, KERNEL_SIZE, MAX_COLOR_LODS, MAX_MIN_Z_LEVELS, PYRAMID_GROUP_SIZE,
};
pub use gate::{HostCapabilities, SkipReason};
pub use jitter::{halton, HaltonSequence, SAMPLE_COUNT};
pub use params::{FrameParameters, QualityFlags};
pub use scope::ResourceScope;
pub use state::PersistentState;
pub use uniforms::{EyeUniforms, FrameUniforms};

// Re-export glam types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};
