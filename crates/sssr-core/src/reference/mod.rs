//! CPU reference executor.
//!
//! Runs a [`CommandList`](crate::CommandList) on in-memory images. The kernels
//! live beside their recording code in the stage modules; this module holds
//! the image type, the shared shading helpers and the interpreter.

mod executor;
mod image;
pub mod math;

pub use executor::{HostImages, ReferenceExecutor};
pub use image::Image;
