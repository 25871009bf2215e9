use super::{Effect, FrameContext};
use crate::renderer::{
    error::RenderResult,
    kernels::{lens_distort::lens_constants, pass},
    pass_spec::PassParams,
    types::ImageBuffer,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LensMode {
    #[default]
    Distort,
    Undistort,
}

impl LensMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "distort" => Some(Self::Distort),
            "undistort" => Some(Self::Undistort),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LensDistortConfig {
    pub mode: LensMode,
    pub amount: f32,
    pub center: [f32; 2],
    pub axis_amount: [f32; 2],
    pub chromatic_aberration: f32,
    pub scale: f32,
    pub oversampling: bool,
}

impl Default for LensDistortConfig {
    fn default() -> Self {
        Self {
            mode: LensMode::Distort,
            amount: 0.0,
            center: [0.5, 0.5],
            axis_amount: [1.0, 1.0],
            chromatic_aberration: 0.0,
            scale: 1.0,
            oversampling: false,
        }
    }
}

impl LensDistortConfig {
    pub fn clamped(mut self) -> Self {
        self.amount = self.amount.clamp(0.0, 100.0);
        self.center = self.center.map(|c| c.clamp(0.0, 1.0));
        self.axis_amount = self.axis_amount.map(|a| a.clamp(0.0, 2.0));
        self.chromatic_aberration = self.chromatic_aberration.clamp(0.0, 1.0);
        self.scale = self.scale.clamp(0.5, 2.0);
        self
    }

    fn pass_params(&self) -> PassParams {
        let (theta, sigma) = lens_constants(self.amount);
        let mode = match self.mode {
            LensMode::Distort => 1.0,
            LensMode::Undistort => 0.0,
        };
        PassParams::new()
            .with_vec4(
                "center_scale",
                [
                    self.center[0] * 2.0 - 1.0,
                    self.center[1] * 2.0 - 1.0,
                    self.axis_amount[0],
                    self.axis_amount[1],
                ],
            )
            .with_vec4("amount", [theta, sigma, 1.0 / self.scale, mode])
            .with_bool("radial", self.amount > 0.0)
            .with_f32("chromatic", self.chromatic_aberration)
            .with_bool("oversample", self.oversampling)
    }
}

impl Effect for LensDistortConfig {
    fn name(&self) -> &'static str {
        "LensDistort"
    }

    fn is_pass_through(&self, _ctx: &FrameContext<'_>) -> bool {
        self.amount <= 0.0 && self.scale == 1.0 && self.chromatic_aberration <= 0.0
    }

    fn apply(
        &self,
        ctx: &FrameContext<'_>,
        src: &ImageBuffer,
        dest: &mut ImageBuffer,
    ) -> RenderResult<()> {
        ctx.executor
            .run_or_copy(pass::LENS_DISTORT, &[src], dest, &self.pass_params())
    }
}
