//! Built-in pass kernels.
//!
//! Each sub-module implements one family of full-screen filters as
//! [`PassKernel`](super::executor::PassKernel)s. `register_builtin_kernels`
//! binds them to the names in [`pass`].

pub mod blur;
pub mod bloom;
pub mod copy;
pub mod dof;
pub mod lens_distort;
pub mod ssr;
pub mod vignette;

use super::executor::PassExecutor;

/// Registered pass names.
pub mod pass {
    pub const COPY: &str = "copy";
    pub const DOWNSAMPLE_BOX: &str = "downsample-box";
    pub const BLUR_HORIZONTAL: &str = "blur-horizontal";
    pub const BLUR_VERTICAL: &str = "blur-vertical";
    pub const BLUR_DIRECTIONAL: &str = "blur-directional";
    pub const THRESHOLD_EXTRACT: &str = "threshold-extract";
    pub const BLOOM_COMPOSITE_ADD: &str = "bloom-composite-add";
    pub const BLOOM_COMPOSITE_SCREEN: &str = "bloom-composite-screen";
    pub const VIGNETTE: &str = "vignette";
    pub const VIGNETTE_BLUR_COMPOSITE: &str = "vignette-blur-composite";
    pub const LENS_DISTORT: &str = "lens-distort";
    pub const DOF_COC: &str = "dof-coc";
    pub const DOF_BOOST: &str = "dof-boost";
    pub const DOF_DIRECTIONAL_BLUR: &str = "dof-directional-blur";
    pub const DOF_COMBINE: &str = "dof-combine";
    pub const DOF_DISC_BLUR: &str = "dof-disc-blur";
    pub const DOF_CIRCLE_COMPOSITE: &str = "dof-circle-composite";
    pub const SSR_BILATERAL_KEY_PACK: &str = "ssr-bilateral-key-pack";
    pub const SSR_TRACE: &str = "ssr-trace";
    pub const SSR_HIT_TO_REFLECTION: &str = "ssr-hit-to-reflection";
    pub const SSR_RESOLVE: &str = "ssr-resolve";
    pub const SSR_COMPOSITE_FINAL: &str = "ssr-composite-final";
}

pub fn register_builtin_kernels(ex: &mut PassExecutor) {
    ex.register(pass::COPY, copy::CopyPass);
    ex.register(pass::DOWNSAMPLE_BOX, copy::DownsampleBox);
    ex.register(pass::BLUR_HORIZONTAL, blur::SeparableBlur::horizontal());
    ex.register(pass::BLUR_VERTICAL, blur::SeparableBlur::vertical());
    ex.register(pass::BLUR_DIRECTIONAL, blur::DirectionalBlur);
    ex.register(pass::THRESHOLD_EXTRACT, bloom::ThresholdExtract);
    ex.register(pass::BLOOM_COMPOSITE_ADD, bloom::BloomComposite::add());
    ex.register(pass::BLOOM_COMPOSITE_SCREEN, bloom::BloomComposite::screen());
    ex.register(pass::VIGNETTE, vignette::Vignette);
    ex.register(pass::VIGNETTE_BLUR_COMPOSITE, vignette::VignetteBlurComposite);
    ex.register(pass::LENS_DISTORT, lens_distort::LensDistort);
    ex.register(pass::DOF_COC, dof::CircleOfConfusion);
    ex.register(pass::DOF_BOOST, dof::WhiteBoost);
    ex.register(pass::DOF_DIRECTIONAL_BLUR, dof::DirectionalBokeh);
    ex.register(pass::DOF_COMBINE, dof::Combine);
    ex.register(pass::DOF_DISC_BLUR, dof::DiscBlur);
    ex.register(pass::DOF_CIRCLE_COMPOSITE, dof::CircleComposite);
    ex.register(pass::SSR_BILATERAL_KEY_PACK, ssr::BilateralKeyPack);
    ex.register(pass::SSR_TRACE, ssr::Trace);
    ex.register(pass::SSR_HIT_TO_REFLECTION, ssr::HitToReflection);
    ex.register(pass::SSR_RESOLVE, ssr::Resolve);
    ex.register(pass::SSR_COMPOSITE_FINAL, ssr::CompositeFinal);
}
