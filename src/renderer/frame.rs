//! Per-frame effect chain.
//!
//! `render_frame` is the whole pipeline: the caller hands in one colour image
//! plus camera and optional G-buffer, and gets back an image of the same size
//! and format. Effects run in list order, each reading the previous result.
//! A frame always produces output: running out of memory or hitting an
//! unknown pass yields the unmodified source, other failures skip one effect.

use std::time::Instant;

use tracing::{debug, warn};

use super::{
    buffer_pool::{BufferPool, PooledBuffer},
    camera::CameraParams,
    effects::{EffectConfig, FrameContext},
    error::RenderResult,
    executor::PassExecutor,
    ray_march::GBufferView,
    types::ImageBuffer,
};

/// Linear view depth (R, world units) and encoded view normals with
/// smoothness in alpha.
#[derive(Clone, Debug)]
pub struct GBuffer {
    pub depth: ImageBuffer,
    pub normals: ImageBuffer,
}

impl GBuffer {
    pub fn view(&self) -> GBufferView<'_> {
        GBufferView {
            depth: &self.depth,
            normals: &self.normals,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FrameInputs {
    pub color: ImageBuffer,
    pub camera: CameraParams,
    pub gbuffer: Option<GBuffer>,
}

impl FrameInputs {
    pub fn new(color: ImageBuffer) -> Self {
        let aspect = color.width() as f32 / color.height().max(1) as f32;
        let defaults = CameraParams::default();
        Self {
            camera: CameraParams::perspective(
                defaults.fov_y_deg,
                aspect,
                defaults.near,
                defaults.far,
            ),
            color,
            gbuffer: None,
        }
    }

    pub fn with_camera(mut self, camera: CameraParams) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_gbuffer(mut self, gbuffer: GBuffer) -> Self {
        self.gbuffer = Some(gbuffer);
        self
    }
}

#[derive(Debug)]
pub struct FrameRenderer {
    pool: BufferPool,
    executor: PassExecutor,
}

impl Default for FrameRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRenderer {
    pub fn new() -> Self {
        Self::with_pool(BufferPool::new())
    }

    pub fn with_pool(pool: BufferPool) -> Self {
        Self {
            pool,
            executor: PassExecutor::with_builtin_kernels(),
        }
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn executor(&self) -> &PassExecutor {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut PassExecutor {
        &mut self.executor
    }

    /// Run `effects` over `inputs.color`.
    ///
    /// Pass-through effects are skipped without touching pixels, so a chain
    /// where every effect is pass-through returns an exact copy of the input.
    /// An allocation failure or an unknown pass aborts the frame and the
    /// unmodified source is returned. Any other effect error skips just that
    /// effect. Free pool buffers the frame did not use are trimmed afterwards.
    pub fn render_frame(&self, inputs: &FrameInputs, effects: &[EffectConfig]) -> ImageBuffer {
        let out = match self.run_chain(inputs, effects) {
            Ok(out) => out,
            Err(err) => {
                warn!(error = %err, "frame aborted, returning the unmodified source");
                inputs.color.duplicate()
            }
        };
        self.pool.trim_unused();
        out
    }

    fn run_chain(
        &self,
        inputs: &FrameInputs,
        effects: &[EffectConfig],
    ) -> RenderResult<ImageBuffer> {
        let ctx = FrameContext {
            pool: &self.pool,
            executor: &self.executor,
            camera: &inputs.camera,
            gbuffer: inputs.gbuffer.as_ref().map(GBuffer::view),
        };

        let mut current: Option<PooledBuffer<'_>> = None;
        for config in effects {
            let effect = config.effect();
            if effect.is_pass_through(&ctx) {
                debug!(effect = effect.name(), "pass-through");
                continue;
            }
            let src: &ImageBuffer = current.as_deref().unwrap_or(&inputs.color);
            let mut dest = self.pool.acquire(src.desc())?;

            let started = Instant::now();
            match effect.apply(&ctx, src, &mut dest) {
                Ok(()) => {
                    debug!(
                        effect = effect.name(),
                        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                        "effect applied"
                    );
                    current = Some(dest);
                }
                Err(err) if err.aborts_frame() => return Err(err),
                Err(err) => {
                    warn!(effect = effect.name(), error = %err, "effect failed, passing its input through");
                }
            }
        }

        Ok(match current {
            Some(buf) => buf.detach(),
            None => inputs.color.duplicate(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{
        effects::{BloomConfig, LensDistortConfig, VignetteConfig},
        executor::PassKernel,
        kernels::pass,
        pass_spec::{OutputSize, PassParams},
        types::{BufferDesc, PixelFormat},
    };

    fn darken() -> EffectConfig {
        EffectConfig::Vignette(VignetteConfig {
            darken: 1.0,
            ..VignetteConfig::default()
        })
    }

    fn white(size: [u32; 2]) -> ImageBuffer {
        ImageBuffer::filled(size, PixelFormat::Rgba16Float, [1.0, 1.0, 1.0, 1.0])
    }

    /// Claims a half-size output so every full-size dispatch mismatches.
    struct HalfSizeOnly;

    impl PassKernel for HalfSizeOnly {
        fn output_size(&self) -> OutputSize {
            OutputSize::HalfOfSource(0)
        }

        fn execute(
            &self,
            _sources: &[&ImageBuffer],
            dest: &mut ImageBuffer,
            _params: &PassParams,
        ) -> RenderResult<()> {
            dest.fill([0.0; 4]);
            Ok(())
        }
    }

    fn gradient(size: [u32; 2]) -> ImageBuffer {
        let mut img = ImageBuffer::new(size, PixelFormat::Rgba16Float);
        img.fill_with(|x, y| [x as f32 / size[0] as f32, y as f32 / size[1] as f32, 0.5, 1.0]);
        img
    }

    #[test]
    fn empty_chain_copies_input() {
        let renderer = FrameRenderer::new();
        let inputs = FrameInputs::new(gradient([12, 7]));
        let out = renderer.render_frame(&inputs, &[]);
        assert_eq!(out, inputs.color);
    }

    #[test]
    fn vignette_darkens_corners_and_keeps_format() {
        let renderer = FrameRenderer::new();
        let inputs = FrameInputs::new(ImageBuffer::filled(
            [32, 32],
            PixelFormat::Rgba8Unorm,
            [1.0, 1.0, 1.0, 1.0],
        ));
        let vignette = EffectConfig::Vignette(VignetteConfig {
            darken: 1.0,
            ..VignetteConfig::default()
        });
        let out = renderer.render_frame(&inputs, &[vignette]);
        assert_eq!(out.format, PixelFormat::Rgba8Unorm);
        assert_eq!(out.size(), [32, 32]);
        assert!(out.get(0, 0)[0] < out.get(16, 16)[0]);
        assert_eq!(renderer.pool().outstanding(), 0);
    }

    #[test]
    fn allocation_failure_falls_back_to_input() {
        let renderer = FrameRenderer::with_pool(BufferPool::with_budget(64));
        let inputs = FrameInputs::new(gradient([16, 16]));
        let bloom = EffectConfig::Bloom(BloomConfig {
            threshold: 0.0,
            ..BloomConfig::default()
        });
        let out = renderer.render_frame(&inputs, &[bloom]);
        assert_eq!(out, inputs.color);
        assert_eq!(renderer.pool().outstanding(), 0);
    }

    #[test]
    fn out_of_memory_mid_chain_returns_the_source() {
        let one_frame = BufferDesc::new([16, 16], PixelFormat::Rgba16Float).byte_size();
        let renderer = FrameRenderer::with_pool(BufferPool::with_budget(one_frame));
        let inputs = FrameInputs::new(white([16, 16]));
        // The first vignette fits the budget, the second cannot get an output.
        let out = renderer.render_frame(&inputs, &[darken(), darken()]);
        assert_eq!(out.get(0, 0), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(out, inputs.color);
        assert_eq!(renderer.pool().outstanding(), 0);
    }

    #[test]
    fn unknown_pass_aborts_the_frame() {
        let mut renderer = FrameRenderer::new();
        assert!(renderer.executor_mut().unregister(pass::LENS_DISTORT));
        let inputs = FrameInputs::new(white([16, 16]));
        let lens = EffectConfig::LensDistort(LensDistortConfig {
            amount: 40.0,
            ..LensDistortConfig::default()
        });
        let out = renderer.render_frame(&inputs, &[darken(), lens]);
        assert_eq!(out, inputs.color);
        assert_eq!(renderer.pool().outstanding(), 0);
    }

    #[test]
    fn size_mismatch_copies_the_pass_input() {
        let mut renderer = FrameRenderer::new();
        renderer.executor_mut().register(pass::VIGNETTE, HalfSizeOnly);
        let inputs = FrameInputs::new(gradient([16, 16]));
        let out = renderer.render_frame(&inputs, &[darken()]);
        assert_eq!(out, inputs.color);
        assert_eq!(renderer.pool().outstanding(), 0);
    }

    #[test]
    fn resized_frames_release_stale_buffers() {
        let renderer = FrameRenderer::new();
        let bloom = EffectConfig::Bloom(BloomConfig::default());
        renderer.render_frame(&FrameInputs::new(gradient([32, 32])), std::slice::from_ref(&bloom));
        let after_large = renderer.pool().allocated_bytes();
        // The 16x16 half-resolution scratch only exists for the large frame.
        let half_of_large = BufferDesc::new([16, 16], PixelFormat::Rgba16Float).byte_size();
        assert!(after_large >= half_of_large);

        renderer.render_frame(&FrameInputs::new(gradient([8, 8])), &[bloom]);
        let after_small = renderer.pool().allocated_bytes();
        assert!(after_small < half_of_large, "{after_small} bytes still pooled");
        assert!(after_small < after_large);
    }
}
