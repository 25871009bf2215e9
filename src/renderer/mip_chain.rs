//! Blur pyramid builder.
//!
//! Level 0 is the (optionally blurred) source at full size; each further level
//! box-downsamples the previous one and blurs it with the same tap radius, so
//! the effective blur roughly doubles per level. Radius 0 skips blurring.

use tracing::debug;

use super::{
    buffer_pool::{BufferPool, PooledBuffer},
    error::RenderResult,
    executor::PassExecutor,
    kernels::pass,
    pass_spec::PassParams,
    types::{BufferDesc, ImageBuffer, mip_size},
};

pub const MAX_MIP_LEVELS: usize = 5;

/// Pooled pyramid levels; all buffers go back to the pool when dropped.
#[derive(Debug)]
pub struct MipChain<'p> {
    levels: Vec<PooledBuffer<'p>>,
}

impl MipChain<'_> {
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, i: usize) -> Option<&ImageBuffer> {
        self.levels.get(i).map(|b| &**b)
    }

    pub fn levels(&self) -> Vec<&ImageBuffer> {
        self.levels.iter().map(|b| &**b).collect()
    }
}

fn blur_in_place(
    pool: &BufferPool,
    executor: &PassExecutor,
    target: &mut ImageBuffer,
    params: &PassParams,
) -> RenderResult<()> {
    let mut tmp = pool.acquire(target.desc())?;
    executor.run_or_copy(pass::BLUR_HORIZONTAL, &[&*target], &mut tmp, params)?;
    executor.run_or_copy(pass::BLUR_VERTICAL, &[&*tmp], target, params)
}

/// Build `levels` (clamped to `1..=MAX_MIP_LEVELS`) pyramid levels from `src`,
/// in the source's format.
pub fn build_blur_pyramid<'p>(
    pool: &'p BufferPool,
    executor: &PassExecutor,
    src: &ImageBuffer,
    levels: usize,
    radius: u32,
) -> RenderResult<MipChain<'p>> {
    let levels = levels.clamp(1, MAX_MIP_LEVELS);
    let base = src.size();
    let params = PassParams::new().with_i32("radius", radius as i32);
    debug!(levels, radius, w = base[0], h = base[1], "build blur pyramid");

    let mut chain = MipChain {
        levels: Vec::with_capacity(levels),
    };

    let mut level0 = pool.acquire(src.desc())?;
    executor.run_or_copy(pass::COPY, &[src], &mut level0, &PassParams::new())?;
    if radius > 0 {
        blur_in_place(pool, executor, &mut level0, &params)?;
    }
    chain.levels.push(level0);

    for i in 1..levels {
        let desc = BufferDesc {
            size: mip_size(base, i as u32),
            ..src.desc()
        };
        let mut next = pool.acquire(desc)?;
        let prev = &chain.levels[i - 1];
        executor.run_or_copy(pass::DOWNSAMPLE_BOX, &[&**prev], &mut next, &PassParams::new())?;
        if radius > 0 {
            blur_in_place(pool, executor, &mut next, &params)?;
        }
        chain.levels.push(next);
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{kernels::copy::box_downsample_texel, types::PixelFormat};

    fn gradient(size: [u32; 2]) -> ImageBuffer {
        let mut img = ImageBuffer::new(size, PixelFormat::Rgba32Float);
        img.fill_with(|x, y| [x as f32 * 0.05, y as f32 * 0.03, ((x * y) % 7) as f32, 1.0]);
        img
    }

    #[test]
    fn level_dimensions_follow_shift_rule() {
        let pool = BufferPool::new();
        let ex = PassExecutor::with_builtin_kernels();
        let src = gradient([37, 10]);
        let chain = build_blur_pyramid(&pool, &ex, &src, 5, 2).unwrap();
        assert_eq!(chain.len(), 5);
        for (i, lvl) in chain.levels().iter().enumerate() {
            assert_eq!(lvl.size(), mip_size([37, 10], i as u32));
        }
    }

    #[test]
    fn radius_zero_is_pure_box_downsampling() {
        let pool = BufferPool::new();
        let ex = PassExecutor::with_builtin_kernels();
        let src = gradient([16, 12]);
        let chain = build_blur_pyramid(&pool, &ex, &src, 4, 0).unwrap();
        assert_eq!(chain.level(0).unwrap().pixels(), src.pixels());
        for i in 1..chain.len() {
            let prev = chain.level(i - 1).unwrap();
            let lvl = chain.level(i).unwrap();
            for y in 0..lvl.height() {
                for x in 0..lvl.width() {
                    assert_eq!(lvl.get(x, y), box_downsample_texel(prev, x, y));
                }
            }
        }
    }

    #[test]
    fn dropping_the_chain_returns_every_buffer() {
        let pool = BufferPool::new();
        let ex = PassExecutor::with_builtin_kernels();
        let src = gradient([8, 8]);
        {
            let _chain = build_blur_pyramid(&pool, &ex, &src, 3, 1).unwrap();
            assert_eq!(pool.outstanding(), 3);
        }
        assert_eq!(pool.outstanding(), 0);
    }
}
