//! Copy and box-downsample kernels.

use crate::renderer::{
    error::RenderResult,
    executor::PassKernel,
    pass_spec::{OutputSize, PassParams},
    sampler::sample,
    types::ImageBuffer,
};

/// Copy source into destination, resampling with the source's filter when the
/// sizes differ. Same-size copies are texel-exact.
pub fn blit(src: &ImageBuffer, dest: &mut ImageBuffer) {
    if dest.copy_from(src) {
        return;
    }
    let [w, h] = dest.size();
    dest.fill_with(|x, y| {
        let uv = [(x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32];
        sample(src, uv)
    });
}

/// 2x2 box average of the texels `(2x..2x+1, 2y..2y+1)`.
pub fn box_downsample_texel(src: &ImageBuffer, x: u32, y: u32) -> [f32; 4] {
    let sx = 2 * x as i64;
    let sy = 2 * y as i64;
    let mut acc = [0.0f32; 4];
    for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        let px = src.load(sx + dx, sy + dy);
        for c in 0..4 {
            acc[c] += px[c];
        }
    }
    acc.map(|c| c * 0.25)
}

pub struct CopyPass;

impl PassKernel for CopyPass {
    fn output_size(&self) -> OutputSize {
        OutputSize::Any
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        _params: &PassParams,
    ) -> RenderResult<()> {
        blit(sources[0], dest);
        Ok(())
    }
}

pub struct DownsampleBox;

impl PassKernel for DownsampleBox {
    fn output_size(&self) -> OutputSize {
        OutputSize::HalfOfSource(0)
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        _params: &PassParams,
    ) -> RenderResult<()> {
        let src = sources[0];
        dest.fill_with(|x, y| box_downsample_texel(src, x, y));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::types::PixelFormat;

    #[test]
    fn downsample_averages_quads() {
        let mut src = ImageBuffer::new([2, 2], PixelFormat::Rgba32Float);
        src.set(0, 0, [1.0, 0.0, 0.0, 1.0]);
        src.set(1, 0, [0.0, 1.0, 0.0, 1.0]);
        src.set(0, 1, [0.0, 0.0, 1.0, 1.0]);
        src.set(1, 1, [1.0, 1.0, 1.0, 1.0]);
        let mut dst = ImageBuffer::new([1, 1], PixelFormat::Rgba32Float);
        DownsampleBox
            .execute(&[&src], &mut dst, &PassParams::new())
            .unwrap();
        assert_eq!(dst.get(0, 0), [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn blit_same_size_is_exact() {
        let src = ImageBuffer::filled([3, 5], PixelFormat::Rgba16Float, [0.3, 0.6, 0.9, 1.0]);
        let mut dst = ImageBuffer::new([3, 5], PixelFormat::Rgba16Float);
        blit(&src, &mut dst);
        assert_eq!(dst.pixels(), src.pixels());
    }
}
