//! Shader form: a flat uniform bundle for a single per-pixel pass, the GLSL
//! fragment source, and backend selection with filter-graph fallback.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tonal_models::{ColorVisionFilter, Profile, RenderMode};
use tracing::{debug, warn};

use super::graph::FilterGraph;
use super::ops::{self, Hdr, GRAIN_SEED, NOOP_BLUR_SIGMA};
use super::presets::{self, UserBank, STYLE_VIBRANCE};
use super::{CompileInput, CompiledPipeline};
use crate::error::{EngineError, EngineResult};
use crate::matrix::ColorMatrix;
use crate::metrics::names;

/// GLSL fragment shader consuming [`ShaderUniforms`].
pub const FRAGMENT_SOURCE: &str = include_str!("../shader/grade.frag");

/// Uniform bundle; field names match the `u_` uniforms of [`FRAGMENT_SOURCE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderUniforms {
    pub bypass: f32,
    pub channel_gain: [f32; 3],
    /// High-pass amount; zero selects the blur path
    pub sharpen_amount: f32,
    pub detail_sigma: f32,
    pub black_offset: f32,
    /// White/highlights parameter; zero disables the rolloff
    pub highlights: f32,
    pub denoise_mix: f32,
    pub denoise_sigma: f32,
    pub grain_amount: f32,
    pub grain_seed: u32,
    /// Positive boosts, negative softens
    pub hdr_strength: f32,
    pub cvf_matrix: [f32; 20],
    pub profile_matrix: [f32; 20],
    pub user_enabled: f32,
    /// Levels scale and offset
    pub brightness: f32,
    pub brightness_offset: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue_sin: f32,
    pub hue_cos: f32,
    pub gamma: f32,
    pub shadows: f32,
    pub user_highlights: f32,
    pub vibrance: f32,
    pub style_matrix: [f32; 20],
    pub style_vibrance: f32,
    pub auto_matrix: [f32; 20],
}

impl ShaderUniforms {
    /// Uniforms that leave every pixel untouched.
    pub fn bypass() -> Self {
        let identity = ColorMatrix::IDENTITY.to_f32();
        Self {
            bypass: 1.0,
            channel_gain: [1.0; 3],
            sharpen_amount: 0.0,
            detail_sigma: NOOP_BLUR_SIGMA as f32,
            black_offset: 0.0,
            highlights: 0.0,
            denoise_mix: 0.0,
            denoise_sigma: 0.0,
            grain_amount: 0.0,
            grain_seed: GRAIN_SEED,
            hdr_strength: 0.0,
            cvf_matrix: identity,
            profile_matrix: identity,
            user_enabled: 0.0,
            brightness: 1.0,
            brightness_offset: 0.0,
            contrast: 1.0,
            saturation: 1.0,
            hue_sin: 0.0,
            hue_cos: 1.0,
            gamma: 1.0,
            shadows: 0.0,
            user_highlights: 0.0,
            vibrance: 0.0,
            style_matrix: identity,
            style_vibrance: 0.0,
            auto_matrix: identity,
        }
    }

    /// Derive uniforms from the same analytic parameters as the operation list.
    pub fn from_input(input: &CompileInput) -> Self {
        let mut u = Self::bypass();
        u.bypass = 0.0;
        let params = &input.params;

        let detail = ops::detail_amount(input);
        if detail > 0.0 {
            u.sharpen_amount = detail as f32;
            u.detail_sigma = params.radius as f32;
        } else if detail < 0.0 {
            u.detail_sigma = (-detail) as f32;
        }

        u.black_offset = ops::black_offset(input) as f32;
        u.highlights = params.white as f32;

        if let Some((mix, sigma)) = ops::denoise(input) {
            u.denoise_mix = mix as f32;
            u.denoise_sigma = sigma as f32;
        } else {
            u.grain_amount = ops::grain_alpha(input) as f32;
        }

        u.hdr_strength = match ops::hdr(input) {
            Some(Hdr::Boost(boost)) => boost.strength as f32,
            Some(Hdr::Soften(soften)) => -soften.strength as f32,
            None => 0.0,
        };

        if input.color_vision_filter != ColorVisionFilter::None {
            u.cvf_matrix = ColorMatrix::color_vision(input.color_vision_filter, 1.0).to_f32();
        }

        if input.profile == Profile::User {
            let bank = UserBank::from_params(params);
            let span = (bank.white_point - bank.black_point).max(0.05);
            let (sin, cos) = bank.hue.to_radians().sin_cos();
            u.user_enabled = 1.0;
            u.channel_gain = [bank.gain[0] as f32, bank.gain[1] as f32, bank.gain[2] as f32];
            u.brightness = (1.0 / span) as f32;
            u.brightness_offset = (-bank.black_point / span) as f32;
            u.contrast = bank.contrast as f32;
            u.saturation = bank.saturation as f32;
            u.hue_sin = sin as f32;
            u.hue_cos = cos as f32;
            u.gamma = bank.gamma as f32;
            u.shadows = bank.shadows as f32;
            u.user_highlights = bank.highlights as f32;
            u.vibrance = bank.vibrance as f32;
        } else if let Some(matrix) = presets::profile_matrix(input.profile, params) {
            u.profile_matrix = matrix.to_f32();
        }

        if let Some(matrix) = presets::style_matrix(&input.toggles) {
            u.style_matrix = matrix.to_f32();
        }
        if input.toggles.vibrant {
            u.style_vibrance = STYLE_VIBRANCE as f32;
        }

        if let Some(matrix) = input.active_auto_matrix() {
            u.auto_matrix = matrix.to_f32();
        }
        u
    }

    pub fn is_bypass(&self) -> bool {
        self.bypass > 0.5
    }

    pub fn is_finite(&self) -> bool {
        let scalars = [
            self.bypass,
            self.sharpen_amount,
            self.detail_sigma,
            self.black_offset,
            self.highlights,
            self.denoise_mix,
            self.denoise_sigma,
            self.grain_amount,
            self.hdr_strength,
            self.user_enabled,
            self.brightness,
            self.brightness_offset,
            self.contrast,
            self.saturation,
            self.hue_sin,
            self.hue_cos,
            self.gamma,
            self.shadows,
            self.user_highlights,
            self.vibrance,
            self.style_vibrance,
        ];
        scalars
            .iter()
            .chain(self.channel_gain.iter())
            .chain(self.cvf_matrix.iter())
            .chain(self.profile_matrix.iter())
            .chain(self.style_matrix.iter())
            .chain(self.auto_matrix.iter())
            .all(|v| v.is_finite())
    }
}

/// Fragment source plus uniforms, ready for a shader backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShaderProgram {
    pub fragment_source: &'static str,
    pub uniforms: ShaderUniforms,
}

impl ShaderProgram {
    pub fn new(uniforms: ShaderUniforms) -> Self {
        Self {
            fragment_source: FRAGMENT_SOURCE,
            uniforms,
        }
    }
}

/// A per-pixel shading backend.
pub trait ShaderBackend {
    fn name(&self) -> &str;

    /// Compile and link `program`; failures are [`EngineError::ShaderBuildFailed`].
    fn build(&self, program: &ShaderProgram) -> EngineResult<()>;
}

/// Backend that validates programs for the CPU evaluator in [`crate::render`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuShaderBackend;

impl ShaderBackend for CpuShaderBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn build(&self, program: &ShaderProgram) -> EngineResult<()> {
        if !program.fragment_source.contains("void main") {
            return Err(EngineError::shader_build_failed(
                self.name(),
                "fragment source has no entry point",
            ));
        }
        if !program.uniforms.is_finite() {
            return Err(EngineError::shader_build_failed(
                self.name(),
                "non-finite uniform value",
            ));
        }
        Ok(())
    }
}

/// What the rendering collaborator should apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum RenderPlan {
    FilterGraph(FilterGraph),
    Shader(ShaderProgram),
}

impl RenderPlan {
    pub fn mode(&self) -> RenderMode {
        match self {
            RenderPlan::FilterGraph(_) => RenderMode::FilterGraph,
            RenderPlan::Shader(_) => RenderMode::Shader,
        }
    }
}

#[derive(Debug)]
pub struct PlanOutcome {
    pub plan: RenderPlan,
    /// Set when the shader backend failed and the filter graph was used instead
    pub fallback: Option<EngineError>,
}

/// Chooses a backend and remembers shader failures.
///
/// After the first [`EngineError::ShaderBuildFailed`] the filter graph is
/// pinned until [`BackendSelector::reset`].
#[derive(Debug, Clone, Default)]
pub struct BackendSelector {
    preferred: RenderMode,
    failure: Option<String>,
}

impl BackendSelector {
    pub fn new(preferred: RenderMode) -> Self {
        Self {
            preferred,
            failure: None,
        }
    }

    pub fn set_preferred(&mut self, mode: RenderMode) {
        self.preferred = mode;
    }

    pub fn preferred(&self) -> RenderMode {
        self.preferred
    }

    pub fn active(&self) -> RenderMode {
        if self.failure.is_some() {
            RenderMode::FilterGraph
        } else {
            self.preferred
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn reset(&mut self) {
        self.failure = None;
    }

    pub fn plan(&mut self, pipeline: &CompiledPipeline, backend: &dyn ShaderBackend) -> PlanOutcome {
        if self.active() == RenderMode::Shader {
            let program = pipeline.shader_program();
            match backend.build(&program) {
                Ok(()) => {
                    return PlanOutcome {
                        plan: RenderPlan::Shader(program),
                        fallback: None,
                    }
                }
                Err(err) => {
                    let err = match err {
                        EngineError::ShaderBuildFailed { .. } => err,
                        other => EngineError::shader_build_failed(backend.name(), other.to_string()),
                    };
                    warn!(
                        backend = backend.name(),
                        error = %err,
                        "Shader build failed, pinning filter graph"
                    );
                    counter!(names::SHADER_FALLBACKS).increment(1);
                    self.failure = Some(err.to_string());
                    return PlanOutcome {
                        plan: RenderPlan::FilterGraph(pipeline.graph.clone()),
                        fallback: Some(err),
                    };
                }
            }
        }

        if self.preferred == RenderMode::Shader {
            debug!(reason = ?self.failure, "Using pinned filter graph backend");
        }
        PlanOutcome {
            plan: RenderPlan::FilterGraph(pipeline.graph.clone()),
            fallback: None,
        }
    }
}
