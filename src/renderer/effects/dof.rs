use tracing::warn;

use super::{Effect, FrameContext};
use crate::renderer::{
    buffer_pool::PooledBuffer,
    error::RenderResult,
    kernels::{dof::explicit_ramps, pass},
    pass_spec::PassParams,
    types::{ImageBuffer, mip_size},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DofMode {
    #[default]
    Basic,
    Advanced,
    Explicit,
}

impl DofMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Some(Self::Basic),
            "advanced" => Some(Self::Advanced),
            "explicit" => Some(Self::Explicit),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ApertureShape {
    #[default]
    Hexagon,
    Octagon,
    Circle,
}

impl ApertureShape {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hexagon" => Some(Self::Hexagon),
            "octagon" | "octogon" => Some(Self::Octagon),
            "circle" => Some(Self::Circle),
            _ => None,
        }
    }
}

const HEXAGON_DELTAS: [[f32; 2]; 3] = [[0.5, 0.0], [0.25, 0.433_013], [0.25, -0.433_013]];
const OCTAGON_DELTAS: [[f32; 2]; 4] = [
    [0.5, 0.0],
    [0.0, 0.5],
    [-0.353_553, 0.353_553],
    [0.353_553, 0.353_553],
];

/// Depth-of-field settings. Plane and range values are in `[0, 2]` and map
/// to normalised depth through a 4th power, so most of the slider covers the
/// near part of the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthOfFieldConfig {
    pub mode: DofMode,
    pub shape: ApertureShape,
    pub visualize: bool,
    pub near_plane: f32,
    pub near_radius: f32,
    pub focus_plane: f32,
    pub focus_range: f32,
    pub far_plane: f32,
    pub far_radius: f32,
    pub boost_point: f32,
    pub near_boost: f32,
    pub far_boost: f32,
    pub f_stops: f32,
}

impl Default for DepthOfFieldConfig {
    fn default() -> Self {
        Self {
            mode: DofMode::Basic,
            shape: ApertureShape::Hexagon,
            visualize: false,
            near_plane: 0.0,
            near_radius: 5.0,
            focus_plane: 0.5,
            focus_range: 0.0,
            far_plane: 1.0,
            far_radius: 5.0,
            boost_point: 0.75,
            near_boost: 0.0,
            far_boost: 0.0,
            f_stops: 22.0,
        }
    }
}

fn pow4(x: f32) -> f32 {
    let x2 = x * x;
    x2 * x2
}

impl DepthOfFieldConfig {
    pub fn clamped(mut self) -> Self {
        self.near_plane = self.near_plane.clamp(0.0, 2.0);
        self.near_radius = self.near_radius.clamp(0.0, 15.0);
        self.focus_plane = self.focus_plane.clamp(0.0, 2.0);
        self.focus_range = self.focus_range.clamp(0.0, 2.0);
        self.far_plane = self.far_plane.clamp(0.0, 2.0);
        self.far_radius = self.far_radius.clamp(0.0, 15.0);
        self.boost_point = self.boost_point.clamp(0.0, 4.0);
        self.near_boost = self.near_boost.clamp(0.0, 5.0);
        self.far_boost = self.far_boost.clamp(0.0, 5.0);
        self.f_stops = self.f_stops.clamp(0.1, 32.0);
        self
    }

    pub fn max_radius(&self) -> f32 {
        self.near_radius.max(self.far_radius)
    }

    fn radii(&self) -> [f32; 2] {
        [self.near_radius, self.far_radius]
    }

    /// Params for the `dof-coc` pass.
    pub fn coc_params(&self, ctx: &FrameContext<'_>) -> PassParams {
        let focus = pow4(self.focus_plane);
        let (model, coeffs) = match self.mode {
            DofMode::Basic | DofMode::Advanced => {
                let range = if self.mode == DofMode::Advanced {
                    pow4(self.focus_range)
                } else {
                    0.0
                };
                let focal = ctx.camera.focal_length();
                let aperture = focal / self.f_stops;
                (0, [aperture, focal, focus, range])
            }
            DofMode::Explicit => (
                1,
                explicit_ramps(
                    pow4(self.near_plane),
                    focus,
                    pow4(self.far_plane),
                    pow4(self.focus_range),
                ),
            ),
        };
        PassParams::new()
            .with_i32("model", model)
            .with_vec4("coc", coeffs)
            .with_f32("far_clip", ctx.camera.far)
    }

    fn wants_boost(&self) -> bool {
        self.mode != DofMode::Basic && (self.near_boost > 0.0 || self.far_boost > 0.0)
    }

    fn bokeh<'p>(
        &self,
        ctx: &FrameContext<'p>,
        color: &ImageBuffer,
        coc: &ImageBuffer,
        delta: [f32; 2],
    ) -> RenderResult<PooledBuffer<'p>> {
        let mut out = ctx.pool.acquire(ctx.scratch(color.size()))?;
        let params = PassParams::new()
            .with_vec2("delta", delta)
            .with_vec2("radii", self.radii());
        ctx.executor
            .run_or_copy(pass::DOF_DIRECTIONAL_BLUR, &[color, coc], &mut out, &params)?;
        Ok(out)
    }

    fn polygon(
        &self,
        ctx: &FrameContext<'_>,
        color: &ImageBuffer,
        coc: &ImageBuffer,
        dest: &mut ImageBuffer,
    ) -> RenderResult<()> {
        let (b, d) = match self.shape {
            ApertureShape::Octagon => {
                let a = self.bokeh(ctx, color, coc, OCTAGON_DELTAS[0])?;
                let b = self.bokeh(ctx, &a, coc, OCTAGON_DELTAS[1])?;
                drop(a);
                let c = self.bokeh(ctx, color, coc, OCTAGON_DELTAS[2])?;
                let d = self.bokeh(ctx, &c, coc, OCTAGON_DELTAS[3])?;
                (b, d)
            }
            _ => {
                let a = self.bokeh(ctx, color, coc, HEXAGON_DELTAS[0])?;
                let b = self.bokeh(ctx, &a, coc, HEXAGON_DELTAS[1])?;
                let c = self.bokeh(ctx, &a, coc, HEXAGON_DELTAS[2])?;
                (b, c)
            }
        };
        ctx.executor
            .run_or_copy(pass::DOF_COMBINE, &[&*b, &*d], dest, &PassParams::new())
    }

    fn circle(
        &self,
        ctx: &FrameContext<'_>,
        color: &ImageBuffer,
        coc: &ImageBuffer,
        dest: &mut ImageBuffer,
    ) -> RenderResult<()> {
        let mut blurred = ctx.pool.acquire(ctx.scratch(mip_size(color.size(), 1)))?;
        let half_radii = PassParams::new().with_vec2("radii", self.radii().map(|r| r * 0.5));
        ctx.executor
            .run_or_copy(pass::DOF_DISC_BLUR, &[color, coc], &mut blurred, &half_radii)?;
        let params = PassParams::new().with_vec2("radii", self.radii());
        ctx.executor.run_or_copy(
            pass::DOF_CIRCLE_COMPOSITE,
            &[color, coc, &*blurred],
            dest,
            &params,
        )
    }
}

impl Effect for DepthOfFieldConfig {
    fn name(&self) -> &'static str {
        "DepthOfField"
    }

    fn is_pass_through(&self, ctx: &FrameContext<'_>) -> bool {
        if ctx.gbuffer.is_none() {
            warn!(effect = self.name(), "no depth buffer supplied, skipping");
            return true;
        }
        self.max_radius() <= 0.0
    }

    fn apply(
        &self,
        ctx: &FrameContext<'_>,
        src: &ImageBuffer,
        dest: &mut ImageBuffer,
    ) -> RenderResult<()> {
        let Some(gbuffer) = ctx.gbuffer else {
            return ctx
                .executor
                .run_or_copy(pass::COPY, &[src], dest, &PassParams::new());
        };
        let ex = ctx.executor;
        let coc_params = self.coc_params(ctx);

        if self.visualize {
            return ex.run_or_copy(pass::DOF_COC, &[src, gbuffer.depth], dest, &coc_params);
        }

        let mut coc = ctx.pool.acquire(ctx.scratch(src.size()))?;
        ex.run_or_copy(pass::DOF_COC, &[src, gbuffer.depth], &mut coc, &coc_params)?;

        let boosted = if self.wants_boost() {
            let mut b = ctx.pool.acquire(ctx.scratch(src.size()))?;
            let params = PassParams::new().with_vec4(
                "boost",
                [self.boost_point, self.near_boost * 0.5, self.far_boost * 0.5, 0.0],
            );
            ex.run_or_copy(pass::DOF_BOOST, &[src, &*coc], &mut b, &params)?;
            Some(b)
        } else {
            None
        };
        let color: &ImageBuffer = boosted.as_deref().unwrap_or(src);

        match self.shape {
            ApertureShape::Circle => self.circle(ctx, color, &coc, dest),
            ApertureShape::Hexagon | ApertureShape::Octagon => self.polygon(ctx, color, &coc, dest),
        }
    }
}
