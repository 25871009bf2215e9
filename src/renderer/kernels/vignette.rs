//! Vignette kernels.
//!
//! The mask is a radial ramp on squared distance from the centre:
//! `t = saturate((d² - r1) * inv)` with `d` in `[-1, 1]` per axis. It then
//! drives desaturation, darkening and (optionally) a blend towards a blurred copy.

use crate::{
    color::luminance,
    renderer::{
        error::RenderResult,
        executor::PassKernel,
        pass_spec::PassParams,
        sampler::{lerp, lerp_rgba, sample, saturate},
        types::{ImageBuffer, Rgba},
    },
};

/// Mask parameters packed as `(r1, 1 / (r2² - r1), darken, desaturate)`.
pub fn mask_params(radius: f32, spread: f32, darken: f32, desaturate: f32) -> [f32; 4] {
    let r1 = 0.5 * radius * radius;
    let r2 = radius + spread;
    let denom = (r2 * r2 - r1).max(1e-4);
    [r1, 1.0 / denom, darken, desaturate]
}

pub fn vignette_mask(uv: [f32; 2], r1: f32, inv: f32) -> f32 {
    let dx = uv[0] * 2.0 - 1.0;
    let dy = uv[1] * 2.0 - 1.0;
    saturate((dx * dx + dy * dy - r1) * inv)
}

fn shade(px: Rgba, t: f32, darken: f32, desaturate: f32) -> Rgba {
    let gray = luminance(px);
    let k = 1.0 - t * darken;
    let s = t * desaturate;
    [
        lerp(px[0], gray, s) * k,
        lerp(px[1], gray, s) * k,
        lerp(px[2], gray, s) * k,
        px[3],
    ]
}

/// Params: `mask` (vec4 from [`mask_params`]).
pub struct Vignette;

impl PassKernel for Vignette {
    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let src = sources[0];
        let [r1, inv, darken, desat] = params.vec4_or("mask", [0.125, 1.0, 0.0, 0.0]);
        dest.fill_with(|x, y| {
            let t = vignette_mask(src.texel_uv(x, y), r1, inv);
            shade(src.get(x, y), t, darken, desat)
        });
        Ok(())
    }
}

/// Sources: `[source, blur_light, blur_heavy]`. Params: `mask`, `blur` (0..1).
pub struct VignetteBlurComposite;

impl PassKernel for VignetteBlurComposite {
    fn min_sources(&self) -> usize {
        3
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let (src, blur1, blur2) = (sources[0], sources[1], sources[2]);
        let [r1, inv, darken, desat] = params.vec4_or("mask", [0.125, 1.0, 0.0, 0.0]);
        let blur = saturate(params.f32_or("blur", 0.0));
        dest.fill_with(|x, y| {
            let uv = src.texel_uv(x, y);
            let t = vignette_mask(uv, r1, inv);
            let blurred = lerp_rgba(sample(blur1, uv), sample(blur2, uv), t);
            let mut px = lerp_rgba(src.get(x, y), blurred, t * blur);
            px[3] = src.get(x, y)[3];
            shade(px, t, darken, desat)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_is_zero_at_centre_and_grows_outward() {
        let [r1, inv, ..] = mask_params(0.5, 0.5, 1.0, 0.0);
        assert_eq!(vignette_mask([0.5, 0.5], r1, inv), 0.0);
        let mid = vignette_mask([0.8, 0.5], r1, inv);
        let edge = vignette_mask([1.0, 1.0], r1, inv);
        assert!(mid > 0.0 && mid < edge, "mid={mid} edge={edge}");
        assert_eq!(edge, 1.0);
    }

    #[test]
    fn zero_strengths_leave_texel_alone() {
        let px = [0.2, 0.4, 0.6, 1.0];
        assert_eq!(shade(px, 1.0, 0.0, 0.0), px);
    }
}
