use tracing::debug;

use super::{Effect, FrameContext};
use crate::renderer::{
    composite::bloom_level_weights,
    error::RenderResult,
    kernels::pass,
    mip_chain::{MAX_MIP_LEVELS, build_blur_pyramid},
    pass_spec::PassParams,
    types::{ImageBuffer, mip_size},
};

/// Largest pyramid blur radius (taps) bloom will request.
pub const MAX_BLOOM_RADIUS: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BloomBlend {
    #[default]
    Add,
    Screen,
}

impl BloomBlend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Some(Self::Add),
            "screen" => Some(Self::Screen),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BloomConfig {
    pub threshold: f32,
    pub intensity: f32,
    pub blur_amount: f32,
    /// Percent.
    pub spread_amount: f32,
    pub tint: [f32; 4],
    pub kernel_size: f32,
    /// Multiplier on the kernel radius for the fine (blur) levels.
    pub blur_kernel_scale: f32,
    /// Multiplier on the kernel radius for the coarse (spread) levels.
    pub spread_kernel_scale: f32,
    pub blend: BloomBlend,
    pub high_quality: bool,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            intensity: 0.5,
            blur_amount: 1.0,
            spread_amount: 0.0,
            tint: [1.0; 4],
            kernel_size: 50.0,
            blur_kernel_scale: 1.0,
            spread_kernel_scale: 3.0,
            blend: BloomBlend::Add,
            high_quality: false,
        }
    }
}

impl BloomConfig {
    pub fn clamped(mut self) -> Self {
        self.threshold = self.threshold.clamp(0.0, 4.0);
        self.intensity = self.intensity.clamp(0.0, 5.0);
        self.blur_amount = self.blur_amount.clamp(0.0, 5.0);
        self.spread_amount = self.spread_amount.clamp(0.0, 100.0);
        self.tint = self.tint.map(|c| c.max(0.0));
        self.kernel_size = self.kernel_size.clamp(10.0, 100.0);
        self.blur_kernel_scale = self.blur_kernel_scale.clamp(1.0, 20.0);
        self.spread_kernel_scale = self.spread_kernel_scale.clamp(3.0, 20.0);
        self
    }

    /// `(blur, spread)` pyramid radii for a source `width`.
    ///
    /// The base radius is `width * kernel_size / 1024`, halved in standard
    /// quality, then scaled per pyramid. Spread never blurs less than blur.
    pub fn pyramid_radii(&self, width: u32) -> (u32, u32) {
        let rcoe = if self.high_quality { 1.0 } else { 0.5 };
        let base = width as f32 * self.kernel_size / 1024.0 * rcoe;
        let taps = |scale: f32| ((base * scale).round().max(0.0) as u32).min(MAX_BLOOM_RADIUS);
        let blur = taps(self.blur_kernel_scale);
        (blur, taps(self.spread_kernel_scale).max(blur))
    }
}

impl Effect for BloomConfig {
    fn name(&self) -> &'static str {
        "Bloom"
    }

    fn is_pass_through(&self, _ctx: &FrameContext<'_>) -> bool {
        self.intensity <= 0.0 || (self.blur_amount <= 0.0 && self.spread_amount <= 0.0)
    }

    fn apply(
        &self,
        ctx: &FrameContext<'_>,
        src: &ImageBuffer,
        dest: &mut ImageBuffer,
    ) -> RenderResult<()> {
        let ex = ctx.executor;
        let threshold = PassParams::new().with_f32("threshold", self.threshold);

        // Standard quality extracts at quarter resolution.
        let work_size = if self.high_quality {
            src.size()
        } else {
            mip_size(src.size(), 2)
        };
        let mut bright = ctx.pool.acquire(ctx.scratch(work_size))?;
        if self.high_quality {
            ex.run_or_copy(pass::THRESHOLD_EXTRACT, &[src], &mut bright, &threshold)?;
        } else {
            let mut half = ctx.pool.acquire(ctx.scratch(mip_size(src.size(), 1)))?;
            ex.run_or_copy(pass::DOWNSAMPLE_BOX, &[src], &mut half, &PassParams::new())?;
            let mut quarter = ctx.pool.acquire(ctx.scratch(work_size))?;
            ex.run_or_copy(pass::DOWNSAMPLE_BOX, &[&*half], &mut quarter, &PassParams::new())?;
            ex.run_or_copy(pass::THRESHOLD_EXTRACT, &[&*quarter], &mut bright, &threshold)?;
        }

        let (blur_radius, spread_radius) = self.pyramid_radii(src.width());
        let spread = build_blur_pyramid(ctx.pool, ex, &bright, MAX_MIP_LEVELS, spread_radius)?;
        // The two finest levels carry the blur amount and get their own radius.
        let blur = if blur_radius == spread_radius {
            None
        } else {
            Some(build_blur_pyramid(ctx.pool, ex, &bright, 2, blur_radius)?)
        };
        let weights = bloom_level_weights(spread.len(), self.blur_amount, self.spread_amount);
        let tint = [
            self.tint[0] * self.intensity,
            self.tint[1] * self.intensity,
            self.tint[2] * self.intensity,
            1.0,
        ];
        debug!(blur_radius, spread_radius, ?weights, "bloom pyramids");

        let mut sources: Vec<&ImageBuffer> = vec![src];
        match &blur {
            Some(fine) => {
                sources.extend(fine.levels());
                sources.extend(spread.levels().into_iter().skip(fine.len()));
            }
            None => sources.extend(spread.levels()),
        }
        let composite = match self.blend {
            BloomBlend::Add => pass::BLOOM_COMPOSITE_ADD,
            BloomBlend::Screen => pass::BLOOM_COMPOSITE_SCREEN,
        };
        let params = PassParams::new()
            .with_floats("weights", weights)
            .with_vec4("tint", tint);
        ex.run_or_copy(composite, &sources, dest, &params)
    }
}
