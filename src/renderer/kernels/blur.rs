//! Gaussian blur kernels: separable (horizontal/vertical) and directional.

use crate::renderer::{
    error::RenderResult,
    executor::PassKernel,
    pass_spec::{OutputSize, PassParams},
    sampler::sample_bilinear,
    types::ImageBuffer,
};

/// Largest tap radius a blur pass accepts.
pub const MAX_BLUR_RADIUS: u32 = 16;

/// Normalised gaussian weights for taps `-radius..=radius`.
///
/// Sigma is `radius / 2` (at least 0.5) so the outermost tap sits at two
/// standard deviations.
pub fn gaussian_weights(radius: u32) -> Vec<f32> {
    let radius = radius.min(MAX_BLUR_RADIUS) as i32;
    let sigma = (radius as f32 * 0.5).max(0.5);
    let denom = 2.0 * sigma * sigma;
    let mut w: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = w.iter().sum();
    w.iter_mut().for_each(|v| *v /= sum);
    w
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// One axis of a separable gaussian at the source's own resolution.
///
/// Params: `radius` (int taps, clamped to [`MAX_BLUR_RADIUS`]). Radius 0 copies.
pub struct SeparableBlur {
    axis: Axis,
}

impl SeparableBlur {
    pub fn horizontal() -> Self {
        Self {
            axis: Axis::Horizontal,
        }
    }

    pub fn vertical() -> Self {
        Self {
            axis: Axis::Vertical,
        }
    }
}

impl PassKernel for SeparableBlur {
    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let src = sources[0];
        let radius = params.i32_or("radius", 0).clamp(0, MAX_BLUR_RADIUS as i32);
        if radius == 0 {
            dest.copy_from(src);
            return Ok(());
        }
        let weights = gaussian_weights(radius as u32);
        let (dx, dy) = match self.axis {
            Axis::Horizontal => (1i64, 0i64),
            Axis::Vertical => (0, 1),
        };
        dest.fill_with(|x, y| {
            let mut acc = [0.0f32; 4];
            for (k, w) in weights.iter().enumerate() {
                let o = k as i64 - radius as i64;
                let px = src.load(x as i64 + o * dx, y as i64 + o * dy);
                for c in 0..4 {
                    acc[c] += px[c] * w;
                }
            }
            acc
        });
        Ok(())
    }
}

/// Gaussian along an arbitrary direction, sampled bilinearly at the
/// destination's UVs so it can blur and rescale in one pass.
///
/// Params: `direction` (vec2, source texels between taps), `taps` (int, taps per side).
pub struct DirectionalBlur;

impl PassKernel for DirectionalBlur {
    fn output_size(&self) -> OutputSize {
        OutputSize::Any
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let src = sources[0];
        let dir = params.vec2_or("direction", [1.0, 0.0]);
        let taps = params.i32_or("taps", 2).clamp(0, MAX_BLUR_RADIUS as i32);
        let weights = gaussian_weights(taps as u32);
        let step = [dir[0] / src.width() as f32, dir[1] / src.height() as f32];
        let [w, h] = dest.size();
        dest.fill_with(|x, y| {
            let uv = [(x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32];
            let mut acc = [0.0f32; 4];
            for (k, wt) in weights.iter().enumerate() {
                let o = k as f32 - taps as f32;
                let px = sample_bilinear(src, [uv[0] + step[0] * o, uv[1] + step[1] * o]);
                for c in 0..4 {
                    acc[c] += px[c] * wt;
                }
            }
            acc
        });
        Ok(())
    }
}
