//! Named-pass registry and dispatcher.
//!
//! A pass is one full-screen kernel mapping source buffers to a destination.
//! Passes are looked up by name rather than by position in a multi-pass
//! shader, so adding a kernel never renumbers the others.

use std::collections::HashMap;

use tracing::{trace, warn};

use super::{
    error::{RenderError, RenderResult},
    kernels,
    pass_spec::{OutputSize, PassParams},
    types::{ImageBuffer, mip_size},
};

/// A fixed full-screen filter kernel.
pub trait PassKernel {
    /// Number of source bindings the kernel reads.
    fn min_sources(&self) -> usize {
        1
    }

    fn output_size(&self) -> OutputSize {
        OutputSize::MatchSource(0)
    }

    /// Write every texel of `dest`. `dest` never aliases a source.
    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()>;
}

#[derive(Default)]
pub struct PassExecutor {
    kernels: HashMap<String, Box<dyn PassKernel>>,
}

impl std::fmt::Debug for PassExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.pass_names();
        names.sort_unstable();
        f.debug_struct("PassExecutor").field("passes", &names).finish()
    }
}

impl PassExecutor {
    /// Executor with no passes registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor with every built-in kernel registered.
    pub fn with_builtin_kernels() -> Self {
        let mut ex = Self::new();
        kernels::register_builtin_kernels(&mut ex);
        ex
    }

    pub fn register(&mut self, name: impl Into<String>, kernel: impl PassKernel + 'static) {
        self.kernels.insert(name.into(), Box::new(kernel));
    }

    /// Remove a pass; returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.kernels.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.kernels.keys().map(String::as_str).collect()
    }

    /// Run `pass` reading `sources` and writing `dest`.
    ///
    /// Fails with `UnsupportedPass` for unknown names, `MissingInput` when too
    /// few sources are bound and `DimensionMismatch` when `dest` violates the
    /// kernel's output-size contract. On failure `dest` is left untouched.
    pub fn run(
        &self,
        pass: &str,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let Some(kernel) = self.kernels.get(pass) else {
            return Err(RenderError::UnsupportedPass {
                pass: pass.to_string(),
            });
        };

        if sources.len() < kernel.min_sources() {
            return Err(RenderError::MissingInput {
                pass: pass.to_string(),
                index: sources.len(),
            });
        }

        let expected = match kernel.output_size() {
            OutputSize::MatchSource(i) => Some(source_size(pass, sources, i)?),
            OutputSize::HalfOfSource(i) => Some(mip_size(source_size(pass, sources, i)?, 1)),
            OutputSize::Any => None,
        };
        if let Some(expected) = expected {
            if dest.size() != expected {
                return Err(RenderError::DimensionMismatch {
                    pass: pass.to_string(),
                    expected,
                    actual: dest.size(),
                });
            }
        }

        trace!(pass, w = dest.width(), h = dest.height(), "run pass");
        kernel.execute(sources, dest, params)
    }

    /// Like [`PassExecutor::run`], but `dest` is always written.
    ///
    /// On any failure `dest` receives a resampled copy of the first source.
    /// A `DimensionMismatch` is contained to this pass and reported as
    /// success; every other error is still returned so the caller can abort.
    /// Effects dispatch all of their passes through here.
    pub fn run_or_copy(
        &self,
        pass: &str,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let Err(err) = self.run(pass, sources, dest, params) else {
            return Ok(());
        };
        warn!(pass, error = %err, "pass failed, writing pass-through copy");
        match sources.first() {
            Some(src) => kernels::copy::blit(src, dest),
            None => dest.fill([0.0; 4]),
        }
        match err {
            RenderError::DimensionMismatch { .. } => Ok(()),
            other => Err(other),
        }
    }
}

fn source_size(pass: &str, sources: &[&ImageBuffer], i: usize) -> RenderResult<[u32; 2]> {
    sources
        .get(i)
        .map(|s| s.size())
        .ok_or_else(|| RenderError::MissingInput {
            pass: pass.to_string(),
            index: i,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{kernels::pass, types::PixelFormat};

    #[test]
    fn unknown_pass_is_unsupported() {
        let ex = PassExecutor::with_builtin_kernels();
        let src = ImageBuffer::new([4, 4], PixelFormat::Rgba16Float);
        let mut dst = ImageBuffer::new([4, 4], PixelFormat::Rgba16Float);
        let err = ex
            .run("blur-sideways", &[&src], &mut dst, &PassParams::new())
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::UnsupportedPass {
                pass: "blur-sideways".to_string()
            }
        );
    }

    #[test]
    fn downsample_checks_destination_size() {
        let ex = PassExecutor::with_builtin_kernels();
        let src = ImageBuffer::new([8, 8], PixelFormat::Rgba16Float);
        let mut dst = ImageBuffer::new([8, 8], PixelFormat::Rgba16Float);
        let err = ex
            .run(pass::DOWNSAMPLE_BOX, &[&src], &mut dst, &PassParams::new())
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::DimensionMismatch {
                expected: [4, 4],
                actual: [8, 8],
                ..
            }
        ));
    }

    #[test]
    fn run_or_copy_writes_source_on_failure() {
        let ex = PassExecutor::with_builtin_kernels();
        let src = ImageBuffer::filled([4, 4], PixelFormat::Rgba16Float, [0.25, 0.5, 0.75, 1.0]);
        let mut dst = ImageBuffer::new([4, 4], PixelFormat::Rgba16Float);
        let res = ex.run_or_copy("nope", &[&src], &mut dst, &PassParams::new());
        assert!(matches!(res, Err(RenderError::UnsupportedPass { .. })));
        assert_eq!(dst, src);
    }

    #[test]
    fn size_mismatch_is_contained_to_the_pass() {
        let ex = PassExecutor::with_builtin_kernels();
        let mut src = ImageBuffer::new([8, 8], PixelFormat::Rgba16Float);
        src.fill_with(|x, y| [x as f32 * 0.125, y as f32 * 0.125, 0.5, 1.0]);
        // Downsampling needs a 4x4 destination.
        let mut dst = ImageBuffer::new([8, 8], PixelFormat::Rgba16Float);
        ex.run_or_copy(pass::DOWNSAMPLE_BOX, &[&src], &mut dst, &PassParams::new())
            .unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn unregistered_pass_becomes_unsupported() {
        let mut ex = PassExecutor::with_builtin_kernels();
        assert!(ex.unregister(pass::COPY));
        assert!(!ex.unregister(pass::COPY));
        assert!(!ex.contains(pass::COPY));
    }

    #[test]
    fn missing_source_is_reported() {
        let ex = PassExecutor::with_builtin_kernels();
        let mut dst = ImageBuffer::new([4, 4], PixelFormat::Rgba16Float);
        let err = ex
            .run(pass::COPY, &[], &mut dst, &PassParams::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingInput { index: 0, .. }));
    }
}
