//! Core type definitions for the renderer module.

use half::f16;

/// Linear RGBA texel.
pub type Rgba = [f32; 4];

pub const TRANSPARENT: Rgba = [0.0, 0.0, 0.0, 0.0];

/// Storage format of an [`ImageBuffer`].
///
/// Texels are always held as `f32` in memory; every write is quantized to the
/// precision of the format so results match what a GPU render target of the
/// same format would hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    Rgba8Unorm,
    #[default]
    Rgba16Float,
    Rgba32Float,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8Unorm => 4,
            PixelFormat::Rgba16Float => 8,
            PixelFormat::Rgba32Float => 16,
        }
    }

    /// Round a texel to what this format can store. Idempotent.
    pub fn quantize(self, px: Rgba) -> Rgba {
        match self {
            PixelFormat::Rgba8Unorm => px.map(|c| {
                let c = if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) };
                (c * 255.0).round() / 255.0
            }),
            PixelFormat::Rgba16Float => px.map(|c| f16::from_f32(c).to_f32()),
            PixelFormat::Rgba32Float => px,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Bilinear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum EdgeMode {
    #[default]
    Clamp,
    Wrap,
}

/// Allocation request for a scratch buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size: [u32; 2],
    pub format: PixelFormat,
    pub filter: FilterMode,
    pub edge: EdgeMode,
}

impl BufferDesc {
    pub fn new(size: [u32; 2], format: PixelFormat) -> Self {
        Self {
            size: [size[0].max(1), size[1].max(1)],
            format,
            filter: FilterMode::Bilinear,
            edge: EdgeMode::Clamp,
        }
    }

    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    pub fn byte_size(&self) -> usize {
        self.size[0] as usize * self.size[1] as usize * self.format.bytes_per_pixel()
    }
}

/// A 2D RGBA image with sampling state.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    pub format: PixelFormat,
    pub filter: FilterMode,
    pub edge: EdgeMode,
    pixels: Vec<Rgba>,
}

impl ImageBuffer {
    /// Allocate a zeroed buffer. Panics only if the allocator aborts; the pool
    /// uses [`ImageBuffer::try_new`] instead.
    pub fn new(size: [u32; 2], format: PixelFormat) -> Self {
        let desc = BufferDesc::new(size, format);
        Self {
            width: desc.size[0],
            height: desc.size[1],
            format,
            filter: desc.filter,
            edge: desc.edge,
            pixels: vec![TRANSPARENT; desc.size[0] as usize * desc.size[1] as usize],
        }
    }

    /// Fallible allocation. Returns `None` when the pixel storage cannot be reserved.
    pub fn try_new(desc: &BufferDesc) -> Option<Self> {
        let count = (desc.size[0] as usize).checked_mul(desc.size[1] as usize)?;
        let mut pixels: Vec<Rgba> = Vec::new();
        pixels.try_reserve_exact(count).ok()?;
        pixels.resize(count, TRANSPARENT);
        Some(Self {
            width: desc.size[0],
            height: desc.size[1],
            format: desc.format,
            filter: desc.filter,
            edge: desc.edge,
            pixels,
        })
    }

    pub fn filled(size: [u32; 2], format: PixelFormat, value: Rgba) -> Self {
        let mut buf = Self::new(size, format);
        buf.fill(value);
        buf
    }

    /// Build from row-major texels (row 0 is the top row).
    pub fn from_pixels(size: [u32; 2], format: PixelFormat, pixels: Vec<Rgba>) -> Option<Self> {
        if size[0] == 0 || size[1] == 0 || pixels.len() != size[0] as usize * size[1] as usize {
            return None;
        }
        Some(Self {
            width: size[0],
            height: size[1],
            format,
            filter: FilterMode::Bilinear,
            edge: EdgeMode::Clamp,
            pixels: pixels.into_iter().map(|p| format.quantize(p)).collect(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn desc(&self) -> BufferDesc {
        BufferDesc {
            size: self.size(),
            format: self.format,
            filter: self.filter,
            edge: self.edge,
        }
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn byte_size(&self) -> usize {
        self.pixels.len() * self.format.bytes_per_pixel()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Read a texel. Coordinates outside the buffer follow the edge mode.
    #[inline]
    pub fn load(&self, x: i64, y: i64) -> Rgba {
        let (x, y) = match self.edge {
            EdgeMode::Clamp => (
                x.clamp(0, self.width as i64 - 1),
                y.clamp(0, self.height as i64 - 1),
            ),
            EdgeMode::Wrap => (
                x.rem_euclid(self.width as i64),
                y.rem_euclid(self.height as i64),
            ),
        };
        self.pixels[self.index(x as u32, y as u32)]
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Rgba {
        self.pixels[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, px: Rgba) {
        let i = self.index(x, y);
        self.pixels[i] = self.format.quantize(px);
    }

    pub fn fill(&mut self, px: Rgba) {
        let q = self.format.quantize(px);
        self.pixels.iter_mut().for_each(|p| *p = q);
    }

    /// Write every texel from a function of its integer coordinate.
    pub fn fill_with(&mut self, mut f: impl FnMut(u32, u32) -> Rgba) {
        let w = self.width;
        let format = self.format;
        for (i, px) in self.pixels.iter_mut().enumerate() {
            let x = (i % w as usize) as u32;
            let y = (i / w as usize) as u32;
            *px = format.quantize(f(x, y));
        }
    }

    /// UV of the center of texel `(x, y)`.
    #[inline]
    pub fn texel_uv(&self, x: u32, y: u32) -> [f32; 2] {
        [
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        ]
    }

    /// Overwrite contents with `src` (sizes must match; formats may differ).
    pub fn copy_from(&mut self, src: &ImageBuffer) -> bool {
        if src.size() != self.size() {
            return false;
        }
        let format = self.format;
        if format == src.format {
            self.pixels.copy_from_slice(&src.pixels);
        } else {
            for (d, s) in self.pixels.iter_mut().zip(src.pixels.iter()) {
                *d = format.quantize(*s);
            }
        }
        true
    }

    /// Fresh buffer of the same size/format holding a copy of this one.
    pub fn duplicate(&self) -> ImageBuffer {
        self.clone()
    }
}

pub fn clamp_min_1(v: u32) -> u32 {
    v.max(1)
}

/// Size of mip `level` for a base size: each axis right-shifted, floored, minimum 1.
pub fn mip_size(base: [u32; 2], level: u32) -> [u32; 2] {
    let shift = |v: u32| if level >= 32 { 1 } else { clamp_min_1(v >> level) };
    [shift(base[0]), shift(base[1])]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_is_idempotent() {
        let px = [0.123_456, 0.5, 1.7, -0.2];
        for fmt in [
            PixelFormat::Rgba8Unorm,
            PixelFormat::Rgba16Float,
            PixelFormat::Rgba32Float,
        ] {
            let once = fmt.quantize(px);
            assert_eq!(fmt.quantize(once), once, "{fmt:?}");
        }
    }

    #[test]
    fn load_respects_edge_mode() {
        let mut buf = ImageBuffer::new([2, 1], PixelFormat::Rgba32Float);
        buf.set(0, 0, [1.0, 0.0, 0.0, 1.0]);
        buf.set(1, 0, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(buf.load(-1, 0), [1.0, 0.0, 0.0, 1.0]);
        buf.edge = EdgeMode::Wrap;
        assert_eq!(buf.load(-1, 0), [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn mip_size_never_hits_zero() {
        assert_eq!(mip_size([256, 3], 0), [256, 3]);
        assert_eq!(mip_size([256, 3], 2), [64, 1]);
        assert_eq!(mip_size([1, 1], 4), [1, 1]);
    }
}
