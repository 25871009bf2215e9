//! Bloom kernels: bright-pass extraction and the weighted mip composite.

use crate::{
    color::luminance,
    renderer::{
        error::RenderResult,
        executor::PassKernel,
        pass_spec::{OutputSize, PassParams},
        sampler::sample,
        types::{ImageBuffer, Rgba},
    },
};

/// Keep only the part of each texel's luminance above `threshold`.
///
/// Samples the source at destination UVs, so it may also downscale.
/// Texels at or under the threshold become exactly zero.
pub struct ThresholdExtract;

pub fn threshold_texel(px: Rgba, threshold: f32) -> Rgba {
    let lum = luminance(px);
    if lum <= threshold || lum <= 0.0 {
        return [0.0; 4];
    }
    let k = (lum - threshold) / lum;
    [px[0] * k, px[1] * k, px[2] * k, k.min(1.0)]
}

impl PassKernel for ThresholdExtract {
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
        let threshold = params.f32_or("threshold", 1.0).max(0.0);
        let [w, h] = dest.size();
        dest.fill_with(|x, y| {
            let uv = [(x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32];
            threshold_texel(sample(src, uv), threshold)
        });
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Screen,
}

/// `dest = blend(base, tint * Σ weight[i] * level[i])`.
///
/// Sources: `[base, level0, level1, ...]`. Params: `weights` (float array, one
/// per level, missing entries count as 0) and `tint` (vec4).
pub struct BloomComposite {
    op: BlendOp,
}

impl BloomComposite {
    pub fn add() -> Self {
        Self { op: BlendOp::Add }
    }

    pub fn screen() -> Self {
        Self { op: BlendOp::Screen }
    }
}

pub fn blend_channel(op: BlendOp, base: f32, bloom: f32) -> f32 {
    match op {
        BlendOp::Add => base + bloom,
        // 1 - (1 - a)(1 - b), rearranged so a zero bloom leaves `base` bit-exact.
        BlendOp::Screen => base + bloom - base * bloom,
    }
}

impl PassKernel for BloomComposite {
    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let base = sources[0];
        let levels = &sources[1..];
        let weights = params.floats("weights");
        let tint = params.vec4_or("tint", [1.0; 4]);
        let op = self.op;
        dest.fill_with(|x, y| {
            let b = base.get(x, y);
            let uv = base.texel_uv(x, y);
            let mut bloom = [0.0f32; 3];
            for (i, level) in levels.iter().enumerate() {
                let w = weights.get(i).copied().unwrap_or(0.0);
                if w == 0.0 {
                    continue;
                }
                let px = sample(level, uv);
                for c in 0..3 {
                    bloom[c] += px[c] * w;
                }
            }
            [
                blend_channel(op, b[0], bloom[0] * tint[0]),
                blend_channel(op, b[1], bloom[1] * tint[1]),
                blend_channel(op, b[2], bloom[2] * tint[2]),
                b[3],
            ]
        });
        Ok(())
    }
}
