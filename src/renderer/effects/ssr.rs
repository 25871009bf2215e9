use tracing::{debug, warn};

use super::{Effect, FrameContext};
use crate::renderer::{
    error::RenderResult,
    kernels::{
        pass,
        ssr::{DebugView, camera_params, trace_params},
    },
    mip_chain::{MAX_MIP_LEVELS, build_blur_pyramid},
    pass_spec::PassParams,
    ray_march::TraceSettings,
    types::{BufferDesc, FilterMode, ImageBuffer, PixelFormat, mip_size},
};

/// Blur taps per level of the reflection pyramid.
const REFLECTION_BLUR_RADIUS: u32 = 2;

/// Screen-space reflections: trace, convert hits to colour, build a blurred
/// pyramid, resolve against roughness, and composite over the source.
#[derive(Clone, Debug, PartialEq)]
pub struct SsrConfig {
    pub enable_ssr: bool,
    pub trace: TraceSettings,
    pub half_resolution: bool,
    pub additive: bool,
    pub reflection_multiplier: f32,
    pub distance_blur: f32,
    pub fresnel_fade: f32,
    pub fresnel_power: f32,
    pub bilateral_upsample: bool,
    pub full_res_resolve: bool,
    pub debug: DebugView,
    /// Keep reflection intermediates in 16-bit float; otherwise 8-bit unorm.
    pub use_hdr_intermediates: bool,
}

impl Default for SsrConfig {
    fn default() -> Self {
        Self {
            enable_ssr: true,
            trace: TraceSettings::default(),
            half_resolution: true,
            additive: false,
            reflection_multiplier: 1.0,
            distance_blur: 1.0,
            fresnel_fade: 0.2,
            fresnel_power: 2.0,
            bilateral_upsample: true,
            full_res_resolve: true,
            debug: DebugView::None,
            use_hdr_intermediates: true,
        }
    }
}

impl SsrConfig {
    pub fn clamped(mut self) -> Self {
        self.trace = self.trace.clamped();
        self.reflection_multiplier = self.reflection_multiplier.clamp(0.0, 2.0);
        self.distance_blur = self.distance_blur.clamp(0.0, 1.0);
        self.fresnel_fade = self.fresnel_fade.clamp(0.0, 1.0);
        self.fresnel_power = self.fresnel_power.clamp(0.1, 10.0);
        self
    }

    fn trace_size(&self, src: [u32; 2]) -> [u32; 2] {
        if self.half_resolution {
            mip_size(src, 1)
        } else {
            src
        }
    }

    /// Reflection buffer and pyramid layout. Bilateral upsampling does its
    /// own tap weighting, so the levels are point-sampled then.
    fn reflection_desc(&self, size: [u32; 2]) -> BufferDesc {
        let format = if self.use_hdr_intermediates {
            PixelFormat::Rgba16Float
        } else {
            PixelFormat::Rgba8Unorm
        };
        let filter = if self.bilateral_upsample {
            FilterMode::Nearest
        } else {
            FilterMode::Bilinear
        };
        BufferDesc::new(size, format).with_filter(filter)
    }
}

impl Effect for SsrConfig {
    fn name(&self) -> &'static str {
        "ScreenSpaceReflection"
    }

    fn is_pass_through(&self, ctx: &FrameContext<'_>) -> bool {
        if !self.enable_ssr {
            return true;
        }
        if ctx.gbuffer.is_none() {
            warn!(effect = self.name(), "no G-buffer supplied, skipping");
            return true;
        }
        self.debug == DebugView::None && self.reflection_multiplier <= 0.0
    }

    fn apply(
        &self,
        ctx: &FrameContext<'_>,
        src: &ImageBuffer,
        dest: &mut ImageBuffer,
    ) -> RenderResult<()> {
        let Some(gbuffer) = ctx.gbuffer else {
            return ctx
                .executor
                .run_or_copy(pass::COPY, &[src], dest, &PassParams::new());
        };
        let ex = ctx.executor;
        let g_sources = [gbuffer.depth, gbuffer.normals];
        let trace_size = self.trace_size(src.size());

        let mut key = ctx.pool.acquire(ctx.scratch(gbuffer.depth.size()))?;
        ex.run_or_copy(
            pass::SSR_BILATERAL_KEY_PACK,
            &g_sources,
            &mut key,
            &camera_params(ctx.camera),
        )?;

        let mut hits = ctx
            .pool
            .acquire(BufferDesc::new(trace_size, PixelFormat::Rgba32Float))?;
        ex.run_or_copy(
            pass::SSR_TRACE,
            &g_sources,
            &mut hits,
            &trace_params(&self.trace, ctx.camera),
        )?;

        let mut reflection = ctx.pool.acquire(self.reflection_desc(trace_size))?;
        ex.run_or_copy(
            pass::SSR_HIT_TO_REFLECTION,
            &[src, &*hits],
            &mut reflection,
            &PassParams::new(),
        )?;
        let chain = build_blur_pyramid(
            ctx.pool,
            ex,
            &reflection,
            MAX_MIP_LEVELS,
            REFLECTION_BLUR_RADIUS,
        )?;
        drop(reflection);
        debug!(?trace_size, levels = chain.len(), "ssr reflection pyramid");

        let resolve_size = if self.full_res_resolve {
            src.size()
        } else {
            trace_size
        };
        let mut resolved = ctx.pool.acquire(ctx.scratch(resolve_size))?;
        let mut sources: Vec<&ImageBuffer> = vec![&*key, &*hits];
        sources.extend(chain.levels());
        let resolve = camera_params(ctx.camera)
            .with_vec2("fresnel", [self.fresnel_fade, self.fresnel_power])
            .with_vec2(
                "smoothness",
                [self.trace.min_smoothness, self.trace.smoothness_falloff_range],
            )
            .with_f32("multiplier", self.reflection_multiplier)
            .with_f32("distance_blur", self.distance_blur)
            .with_f32("max_distance", self.trace.max_distance)
            .with_bool("bilateral", self.bilateral_upsample);
        ex.run_or_copy(pass::SSR_RESOLVE, &sources, &mut resolved, &resolve)?;
        drop(sources);
        drop(chain);

        let composite = PassParams::new()
            .with_bool("additive", self.additive)
            .with_i32("debug", self.debug.code());
        ex.run_or_copy(
            pass::SSR_COMPOSITE_FINAL,
            &[src, &*resolved, &*key],
            dest,
            &composite,
        )
    }
}
