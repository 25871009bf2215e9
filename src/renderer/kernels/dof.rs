//! Depth-of-field kernels.
//!
//! The circle-of-confusion map stores normalised near and far blur amounts in
//! R and G (`[0, 1]`, scaled by the near/far radius at use). Bokeh passes
//! gather along one direction, or over a disc, weighting each tap by the radius
//! it would scatter to so sharp texels never bleed into blurred ones.

use crate::{
    color::luminance,
    renderer::{
        error::RenderResult,
        executor::PassKernel,
        pass_spec::{OutputSize, PassParams},
        sampler::{lerp_rgba, sample, sample_bilinear, saturate, smoothstep},
        types::{ImageBuffer, Rgba},
    },
};

/// Upper bound on gather taps per side for directional bokeh.
pub const MAX_BOKEH_TAPS: i32 = 16;
/// Disc samples for the circular aperture.
pub const DISC_SAMPLES: usize = 24;

// ── Circle of confusion ──────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CocModel {
    /// Lens model: `(aperture, focal_length, focus01, focus_range01)`.
    Physical([f32; 4]),
    /// Linear ramps `near = a1*d + b1`, `far = a2*d + b2`, packed `(a1, b1, a2, b2)`.
    Ramps([f32; 4]),
}

/// `(near, far)` blur amounts for normalised depth `d01`.
pub fn coc_at(model: CocModel, d01: f32) -> (f32, f32) {
    match model {
        CocModel::Physical([aperture, _focal, focus, range]) => {
            let diff = (d01 - focus).abs() - range;
            if diff <= 0.0 {
                return (0.0, 0.0);
            }
            let amount = saturate(aperture * diff / d01.max(1e-4));
            if d01 < focus { (amount, 0.0) } else { (0.0, amount) }
        }
        CocModel::Ramps([a1, b1, a2, b2]) => (saturate(a1 * d01 + b1), saturate(a2 * d01 + b2)),
    }
}

/// Explicit-mode ramp coefficients from near/focus/far planes and focus range,
/// all already in normalised depth. Near reaches 1 at the near plane and 0 at
/// `focus - range`; far mirrors it.
pub fn explicit_ramps(near: f32, focus: f32, far: f32, range: f32) -> [f32; 4] {
    const EPS: f32 = 1e-6;
    let far = far.max(near + 4.0 * EPS);
    let focus = focus.clamp(near + EPS, far - EPS);
    let near_range = range.min(focus - near - EPS).max(0.0);
    let far_range = range.min(far - focus - EPS).max(0.0);
    let a1 = 1.0 / (near - focus + near_range).min(-EPS);
    let a2 = 1.0 / (far - focus - far_range).max(EPS);
    [a1, 1.0 - a1 * near, a2, 1.0 - a2 * far]
}

/// Sources: `[color, depth]`. Params: `model` (int, 0 physical / 1 ramps),
/// `coc` (vec4 for the model), `far_clip` (float, world units).
pub struct CircleOfConfusion;

impl PassKernel for CircleOfConfusion {
    fn min_sources(&self) -> usize {
        2
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let depth = sources[1];
        let coeffs = params.vec4_or("coc", [0.0; 4]);
        let model = match params.i32_or("model", 0) {
            1 => CocModel::Ramps(coeffs),
            _ => CocModel::Physical(coeffs),
        };
        let far_clip = params.f32_or("far_clip", 1000.0).max(1e-4);
        let [w, h] = dest.size();
        dest.fill_with(|x, y| {
            let uv = [(x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32];
            let z = sample(depth, uv)[0];
            // Sky and missing depth count as the far plane.
            let d01 = if z <= 0.0 { 1.0 } else { saturate(z / far_clip) };
            let (near, far) = coc_at(model, d01);
            [near, far, 0.0, 1.0]
        });
        Ok(())
    }
}

/// Blur radius in texels a CoC texel asks for.
fn coc_radius(coc: Rgba, radii: [f32; 2]) -> f32 {
    (coc[0] * radii[0]).max(coc[1] * radii[1])
}

// ── White boost ──────────────────────────────────────────────────────────

/// Brightens highlights in out-of-focus regions so bokeh shapes read.
///
/// Sources: `[color, coc]`. Params: `boost` (vec4: boost point, near amount,
/// far amount, unused).
pub struct WhiteBoost;

impl PassKernel for WhiteBoost {
    fn min_sources(&self) -> usize {
        2
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let (color, coc) = (sources[0], sources[1]);
        let [point, near_amt, far_amt, _] = params.vec4_or("boost", [0.75, 0.0, 0.0, 0.0]);
        let point = point.max(0.0);
        dest.fill_with(|x, y| {
            let px = color.get(x, y);
            let c = sample(coc, color.texel_uv(x, y));
            let k = smoothstep(point, point + 1.0, luminance(px));
            let gain = 1.0 + k * (c[0] * near_amt + c[1] * far_amt);
            [px[0] * gain, px[1] * gain, px[2] * gain, px[3]]
        });
        Ok(())
    }
}

// ── Gather blurs ─────────────────────────────────────────────────────────

/// Weight of a tap at `dist` texels: near-field texels scatter by their own
/// radius, far-field texels by the smaller of their own and the centre's.
fn tap_weight(center: Rgba, tap: Rgba, radii: [f32; 2], dist: f32) -> f32 {
    let near = tap[0] * radii[0];
    let far = (tap[1] * radii[1]).min(coc_radius(center, radii));
    saturate(near.max(far) - dist + 1.0)
}

/// One directional leg of a hexagon/octagon bokeh.
///
/// Sources: `[color, coc]`. Params: `delta` (vec2 direction), `radii` (vec2:
/// near/far radius in texels).
pub struct DirectionalBokeh;

impl PassKernel for DirectionalBokeh {
    fn min_sources(&self) -> usize {
        2
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let (color, coc) = (sources[0], sources[1]);
        let radii = params.vec2_or("radii", [0.0, 0.0]).map(|r| r.max(0.0));
        let delta = params.vec2_or("delta", [1.0, 0.0]);
        let len = (delta[0] * delta[0] + delta[1] * delta[1]).sqrt();
        let dir = if len > 1e-6 {
            [delta[0] / len, delta[1] / len]
        } else {
            [1.0, 0.0]
        };
        let max_r = radii[0].max(radii[1]);
        let taps = if max_r > 0.0 {
            (max_r.ceil() as i32).clamp(1, MAX_BOKEH_TAPS)
        } else {
            0
        };
        let spacing = if taps > 0 { max_r / taps as f32 } else { 0.0 };
        let [w, h] = color.size();

        dest.fill_with(|x, y| {
            let uv = color.texel_uv(x, y);
            let center = sample(coc, uv);
            let mut acc = [0.0f32; 4];
            let mut wsum = 0.0f32;
            for i in -taps..=taps {
                let dist = i as f32 * spacing;
                let tuv = [
                    uv[0] + dir[0] * dist / w as f32,
                    uv[1] + dir[1] * dist / h as f32,
                ];
                let tap_coc = if i == 0 { center } else { sample(coc, tuv) };
                let wt = tap_weight(center, tap_coc, radii, dist.abs());
                if wt <= 0.0 {
                    continue;
                }
                let px = if i == 0 { color.get(x, y) } else { sample_bilinear(color, tuv) };
                for c in 0..4 {
                    acc[c] += px[c] * wt;
                }
                wsum += wt;
            }
            // The centre tap always has weight 1.
            acc.map(|v| v / wsum)
        });
        Ok(())
    }
}

/// Average of all sources. Combines the legs of a polygonal bokeh.
pub struct Combine;

impl PassKernel for Combine {
    fn min_sources(&self) -> usize {
        2
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        _params: &PassParams,
    ) -> RenderResult<()> {
        let inv = 1.0 / sources.len() as f32;
        dest.fill_with(|x, y| {
            let mut acc = [0.0f32; 4];
            for src in sources {
                let px = sample(src, src.texel_uv(x, y));
                for c in 0..4 {
                    acc[c] += px[c] * inv;
                }
            }
            acc
        });
        Ok(())
    }
}

/// Golden-angle disc offsets in units of the disc radius.
pub fn disc_kernel(samples: usize) -> Vec<[f32; 2]> {
    let golden = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
    (0..samples)
        .map(|i| {
            let r = ((i as f32 + 0.5) / samples as f32).sqrt();
            let a = i as f32 * golden;
            [r * a.cos(), r * a.sin()]
        })
        .collect()
}

/// Circular bokeh gathered at the destination's resolution (usually half).
///
/// Sources: `[color, coc]`. Params: `radii` (vec2, in destination texels).
pub struct DiscBlur;

impl PassKernel for DiscBlur {
    fn min_sources(&self) -> usize {
        2
    }

    fn output_size(&self) -> OutputSize {
        OutputSize::Any
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let (color, coc) = (sources[0], sources[1]);
        let radii = params.vec2_or("radii", [0.0, 0.0]).map(|r| r.max(0.0));
        let max_r = radii[0].max(radii[1]);
        let kernel = disc_kernel(DISC_SAMPLES);
        let [w, h] = dest.size();

        dest.fill_with(|x, y| {
            let uv = [(x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32];
            let center = sample(coc, uv);
            let mut acc = sample_bilinear(color, uv);
            let mut wsum = 1.0f32;
            for o in &kernel {
                let off = [o[0] * max_r, o[1] * max_r];
                let dist = (off[0] * off[0] + off[1] * off[1]).sqrt();
                let tuv = [uv[0] + off[0] / w as f32, uv[1] + off[1] / h as f32];
                let wt = tap_weight(center, sample(coc, tuv), radii, dist);
                if wt <= 0.0 {
                    continue;
                }
                let px = sample_bilinear(color, tuv);
                for c in 0..4 {
                    acc[c] += px[c] * wt;
                }
                wsum += wt;
            }
            acc.map(|v| v / wsum)
        });
        Ok(())
    }
}

/// Blend the sharp image towards the upsampled disc blur by CoC.
///
/// Sources: `[sharp, coc, blurred]`. Params: `radii` (vec2, full-res texels).
pub struct CircleComposite;

impl PassKernel for CircleComposite {
    fn min_sources(&self) -> usize {
        3
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let (sharp, coc, blurred) = (sources[0], sources[1], sources[2]);
        let radii = params.vec2_or("radii", [0.0, 0.0]).map(|r| r.max(0.0));
        dest.fill_with(|x, y| {
            let uv = sharp.texel_uv(x, y);
            let t = saturate(coc_radius(sample(coc, uv), radii) * 0.5);
            lerp_rgba(sharp.get(x, y), sample_bilinear(blurred, uv), t)
        });
        Ok(())
    }
}
