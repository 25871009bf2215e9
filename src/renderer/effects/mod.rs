//! Effect orchestrators.
//!
//! Each effect sequences pooled scratch buffers through the pass executor
//! to turn one source image into one destination of the same size. Configs are
//! plain data clamped into range on construction; effects never hold state
//! between frames.

pub mod bloom;
pub mod dof;
pub mod lens_distort;
pub mod ssr;
pub mod vignette;

pub use bloom::{BloomBlend, BloomConfig};
pub use dof::{ApertureShape, DepthOfFieldConfig, DofMode};
pub use lens_distort::{LensDistortConfig, LensMode};
pub use ssr::SsrConfig;
pub use vignette::VignetteConfig;

use super::{
    buffer_pool::BufferPool,
    camera::CameraParams,
    error::RenderResult,
    executor::PassExecutor,
    ray_march::GBufferView,
    types::{BufferDesc, ImageBuffer, PixelFormat},
};

/// Format of effect intermediates (16-bit float HDR).
pub const SCRATCH_FORMAT: PixelFormat = PixelFormat::Rgba16Float;

/// Everything an effect may read for one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext<'a> {
    pub pool: &'a BufferPool,
    pub executor: &'a PassExecutor,
    pub camera: &'a CameraParams,
    pub gbuffer: Option<GBufferView<'a>>,
}

impl FrameContext<'_> {
    pub fn scratch(&self, size: [u32; 2]) -> BufferDesc {
        BufferDesc::new(size, SCRATCH_FORMAT)
    }
}

pub trait Effect {
    fn name(&self) -> &'static str;

    /// True when the effect would leave every texel unchanged for this frame.
    fn is_pass_through(&self, ctx: &FrameContext<'_>) -> bool;

    /// Write the processed `src` into `dest` (same size as `src`).
    fn apply(
        &self,
        ctx: &FrameContext<'_>,
        src: &ImageBuffer,
        dest: &mut ImageBuffer,
    ) -> RenderResult<()>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum EffectConfig {
    Bloom(BloomConfig),
    DepthOfField(DepthOfFieldConfig),
    Vignette(VignetteConfig),
    LensDistort(LensDistortConfig),
    ScreenSpaceReflection(SsrConfig),
}

impl EffectConfig {
    pub fn effect(&self) -> &dyn Effect {
        match self {
            Self::Bloom(c) => c,
            Self::DepthOfField(c) => c,
            Self::Vignette(c) => c,
            Self::LensDistort(c) => c,
            Self::ScreenSpaceReflection(c) => c,
        }
    }
}
