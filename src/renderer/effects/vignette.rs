use super::{Effect, FrameContext};
use crate::renderer::{
    error::RenderResult,
    kernels::{pass, vignette::mask_params},
    pass_spec::PassParams,
    types::{ImageBuffer, mip_size},
};

/// Tap radius of each half-resolution blur iteration.
const VIGNETTE_BLUR_RADIUS: i32 = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct VignetteConfig {
    pub radius: f32,
    pub spread: f32,
    pub darken: f32,
    pub desaturate: f32,
    pub blur: f32,
}

impl Default for VignetteConfig {
    fn default() -> Self {
        Self {
            radius: 0.5,
            spread: 0.5,
            darken: 0.0,
            desaturate: 0.0,
            blur: 0.0,
        }
    }
}

impl VignetteConfig {
    pub fn clamped(mut self) -> Self {
        self.radius = self.radius.clamp(0.0, 1.0);
        self.spread = self.spread.clamp(0.0, 1.0);
        self.darken = self.darken.clamp(0.0, 1.0);
        self.desaturate = self.desaturate.clamp(0.0, 1.0);
        self.blur = self.blur.clamp(0.0, 1.0);
        self
    }
}

impl Effect for VignetteConfig {
    fn name(&self) -> &'static str {
        "Vignette"
    }

    fn is_pass_through(&self, _ctx: &FrameContext<'_>) -> bool {
        self.darken <= 0.0 && self.blur <= 0.0 && self.desaturate <= 0.0
    }

    fn apply(
        &self,
        ctx: &FrameContext<'_>,
        src: &ImageBuffer,
        dest: &mut ImageBuffer,
    ) -> RenderResult<()> {
        let ex = ctx.executor;
        let mask = mask_params(self.radius, self.spread, self.darken, self.desaturate);
        if self.blur <= 0.0 {
            let params = PassParams::new().with_vec4("mask", mask);
            return ex.run_or_copy(pass::VIGNETTE, &[src], dest, &params);
        }

        let half_size = mip_size(src.size(), 1);
        let blur = PassParams::new().with_i32("radius", VIGNETTE_BLUR_RADIUS);
        let mut light = ctx.pool.acquire(ctx.scratch(half_size))?;
        let mut heavy = ctx.pool.acquire(ctx.scratch(half_size))?;
        {
            let mut tmp = ctx.pool.acquire(ctx.scratch(half_size))?;
            ex.run_or_copy(pass::DOWNSAMPLE_BOX, &[src], &mut heavy, &PassParams::new())?;
            ex.run_or_copy(pass::BLUR_HORIZONTAL, &[&*heavy], &mut tmp, &blur)?;
            ex.run_or_copy(pass::BLUR_VERTICAL, &[&*tmp], &mut light, &blur)?;
            ex.run_or_copy(pass::BLUR_HORIZONTAL, &[&*light], &mut tmp, &blur)?;
            ex.run_or_copy(pass::BLUR_VERTICAL, &[&*tmp], &mut heavy, &blur)?;
        }

        let params = PassParams::new()
            .with_vec4("mask", mask)
            .with_f32("blur", self.blur);
        ex.run_or_copy(
            pass::VIGNETTE_BLUR_COMPOSITE,
            &[src, &*light, &*heavy],
            dest,
            &params,
        )
    }
}
