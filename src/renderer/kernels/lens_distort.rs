//! Radial lens distortion with optional chromatic aberration and 2x2 oversampling.

use crate::renderer::{
    error::RenderResult,
    executor::PassKernel,
    pass_spec::PassParams,
    sampler::sample,
    types::ImageBuffer,
};

/// Derived lens constants for a distortion amount in `[0, 100]`.
///
/// Returns `(theta, sigma)` where theta is the half field angle in radians
/// (`1.6 * amount` degrees, capped at 160) and `sigma = 2 tan(theta / 2)`.
pub fn lens_constants(amount: f32) -> (f32, f32) {
    let amount = 1.6 * amount.max(1.0);
    let theta = amount.min(160.0).to_radians();
    let sigma = 2.0 * (theta * 0.5).tan();
    (theta, sigma)
}

#[derive(Clone, Copy, Debug)]
pub struct LensParams {
    /// Centre in `[-1, 1]`.
    pub center: [f32; 2],
    pub axis_amount: [f32; 2],
    pub theta: f32,
    pub sigma: f32,
    pub inv_scale: f32,
    pub distort: bool,
    /// Radial warp on; off leaves only the scale.
    pub radial: bool,
}

impl LensParams {
    fn from_params(params: &PassParams) -> Self {
        let cs = params.vec4_or("center_scale", [0.0, 0.0, 1.0, 1.0]);
        let am = params.vec4_or("amount", [0.0, 0.0, 1.0, 1.0]);
        Self {
            center: [cs[0], cs[1]],
            axis_amount: [cs[2], cs[3]],
            theta: am[0],
            sigma: am[1],
            inv_scale: am[2],
            distort: am[3] > 0.5,
            radial: params.bool_or("radial", true),
        }
    }
}

/// Map an output UV to the source UV it shows.
pub fn warp_uv(uv: [f32; 2], p: &LensParams) -> [f32; 2] {
    let mut q = [
        (uv[0] - 0.5) * p.inv_scale + 0.5,
        (uv[1] - 0.5) * p.inv_scale + 0.5,
    ];
    if !p.radial || p.theta <= 0.0 || p.sigma <= 0.0 {
        return q;
    }
    let c = [0.5 + p.center[0] * 0.5, 0.5 + p.center[1] * 0.5];
    let d = [q[0] - c[0], q[1] - c[1]];
    let ruv = [d[0] * p.axis_amount[0], d[1] * p.axis_amount[1]];
    let ru = (ruv[0] * ruv[0] + ruv[1] * ruv[1]).sqrt();
    if ru < 1e-6 {
        return q;
    }
    let k = if p.distort {
        (ru * p.theta).tan() / (ru * p.sigma)
    } else {
        (ru * p.sigma).atan() / (ru * p.theta)
    };
    q[0] += ruv[0] * (k - 1.0);
    q[1] += ruv[1] * (k - 1.0);
    q
}

/// Params: `center_scale` (vec4), `amount` (vec4: theta, sigma, 1/scale,
/// 1 = distort / 0 = undistort), `radial` (bool), `chromatic` (float),
/// `oversample` (bool).
pub struct LensDistort;

impl PassKernel for LensDistort {
    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let src = sources[0];
        let lens = LensParams::from_params(params);
        let chromatic = params.f32_or("chromatic", 0.0).clamp(0.0, 2.0);
        let oversample = params.bool_or("oversample", false);
        let [w, h] = dest.size();
        let offsets: &[[f32; 2]] = if oversample {
            &[[-0.25, -0.25], [0.25, -0.25], [-0.25, 0.25], [0.25, 0.25]]
        } else {
            &[[0.0, 0.0]]
        };
        let inv_n = 1.0 / offsets.len() as f32;

        dest.fill_with(|x, y| {
            let mut acc = [0.0f32; 4];
            for o in offsets {
                let uv = [
                    (x as f32 + 0.5 + o[0]) / w as f32,
                    (y as f32 + 0.5 + o[1]) / h as f32,
                ];
                let warped = warp_uv(uv, &lens);
                let px = if chromatic > 0.0 {
                    let c = [0.5 + lens.center[0] * 0.5, 0.5 + lens.center[1] * 0.5];
                    let at = |k: f32| {
                        [
                            c[0] + (warped[0] - c[0]) * k,
                            c[1] + (warped[1] - c[1]) * k,
                        ]
                    };
                    let g = sample(src, warped);
                    let r = sample(src, at(1.0 + 0.01 * chromatic));
                    let b = sample(src, at(1.0 - 0.01 * chromatic));
                    [r[0], g[1], b[2], g[3]]
                } else {
                    sample(src, warped)
                };
                for ch in 0..4 {
                    acc[ch] += px[ch] * inv_n;
                }
            }
            acc
        });
        Ok(())
    }
}
