//! CPU post-processing renderer.
//!
//! Layers, bottom-up:
//! - `types`, `sampler`: images, pixel formats and texture sampling
//! - `buffer_pool`: scoped scratch allocation
//! - `kernels`, `executor`: named full-screen passes and their dispatcher
//! - `mip_chain`, `ray_march`, `composite`: shared building blocks
//! - `effects`: per-effect orchestration over pooled buffers
//! - `frame`, `headless`, `image_io`: the per-frame entry point and file I/O
//!
//! The main entry points are [`FrameRenderer::render_frame`] and
//! [`render_frame_to_file`].

pub mod buffer_pool;
pub mod camera;
pub mod composite;
pub mod effects;
pub mod error;
pub mod executor;
pub mod frame;
pub mod headless;
pub mod image_io;
pub mod kernels;
pub mod mip_chain;
pub mod pass_spec;
pub mod ray_march;
pub mod sampler;
pub mod types;

pub use buffer_pool::{BufferPool, PoolStats, PooledBuffer};
pub use camera::CameraParams;
pub use effects::{Effect, EffectConfig, FrameContext};
pub use error::{RenderError, RenderResult};
pub use executor::{PassExecutor, PassKernel};
pub use frame::{FrameInputs, FrameRenderer, GBuffer};
pub use headless::{FrameFiles, render_frame_to_file};
pub use pass_spec::{OutputSize, ParamValue, PassParams};
pub use types::{BufferDesc, EdgeMode, FilterMode, ImageBuffer, PixelFormat, Rgba};
