//! Color transform compiler.
//!
//! Turns normalized parameters, the active profile, the color-vision filter,
//! stylistic toggles and the current auto-matrix into an ordered
//! [`ColorOperation`] list, then renders that list into a [`FilterGraph`] and
//! a [`ShaderUniforms`] bundle. Both forms apply the same stages in the same
//! order:
//!
//! gain → detail → black → highlights → denoise/grain → HDR → color vision
//! → profile → style → auto → merge

pub mod graph;
pub mod ops;
pub mod presets;
pub mod shader;
pub mod tone;

pub use graph::{FilterGraph, FilterNode, Primitive, TransferFunction};
pub use ops::{ColorOperation, CurveKind, MatrixStage};
pub use shader::{
    BackendSelector, CpuShaderBackend, PlanOutcome, RenderPlan, ShaderBackend, ShaderProgram,
    ShaderUniforms,
};

use serde::Serialize;
use tonal_models::{ColorVisionFilter, ParameterSet, Profile, StyleToggles};

use crate::matrix::ColorMatrix;

/// Auto-matrices closer than this to identity are treated as identity.
pub const AUTO_IDENTITY_EPSILON: f64 = 1e-9;

/// Everything the compiler reads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompileInput {
    pub params: ParameterSet,
    pub profile: Profile,
    pub color_vision_filter: ColorVisionFilter,
    pub toggles: StyleToggles,
    pub auto_enabled: bool,
    pub auto_matrix: ColorMatrix,
}

impl CompileInput {
    /// The auto-matrix, if it contributes anything.
    pub fn active_auto_matrix(&self) -> Option<ColorMatrix> {
        (self.auto_enabled && !self.auto_matrix.is_identity(AUTO_IDENTITY_EPSILON))
            .then_some(self.auto_matrix)
    }

    /// No stage would change any pixel.
    pub fn is_bypass(&self) -> bool {
        self.params.sliders_neutral()
            && self.profile == Profile::Off
            && self.color_vision_filter == ColorVisionFilter::None
            && !self.toggles.any()
            && self.active_auto_matrix().is_none()
    }
}

/// Output of [`compile`]. Immutable; recompile when any input changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPipeline {
    pub bypass: bool,
    pub operations: Vec<ColorOperation>,
    pub graph: FilterGraph,
    pub uniforms: ShaderUniforms,
}

impl CompiledPipeline {
    /// Explicit no-op pipeline.
    pub fn bypass() -> Self {
        Self {
            bypass: true,
            operations: Vec::new(),
            graph: FilterGraph::passthrough(),
            uniforms: ShaderUniforms::bypass(),
        }
    }

    pub fn shader_program(&self) -> ShaderProgram {
        ShaderProgram::new(self.uniforms.clone())
    }

    /// Canonical JSON description; identical inputs give identical bytes.
    pub fn description(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Every matrix coefficient in the pipeline is finite.
    pub fn is_finite(&self) -> bool {
        let ops_finite = self.operations.iter().all(|op| match op {
            ColorOperation::Matrix { matrix, .. } => matrix.is_finite(),
            ColorOperation::ToneCurve { table, .. } => table.iter().all(|v| v.is_finite()),
            _ => true,
        });
        ops_finite && self.uniforms.is_finite()
    }
}

/// Compile the active pipeline.
pub fn compile(input: &CompileInput) -> CompiledPipeline {
    if input.is_bypass() {
        return CompiledPipeline::bypass();
    }
    let operations = ops::plan_operations(input);
    let graph = FilterGraph::from_operations(&operations);
    CompiledPipeline {
        bypass: false,
        operations,
        graph,
        uniforms: ShaderUniforms::from_input(input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_input_is_bypass() {
        let pipeline = compile(&CompileInput::default());
        assert!(pipeline.bypass);
        assert!(pipeline.graph.is_passthrough());
        assert!(pipeline.uniforms.is_bypass());
    }

    #[test]
    fn test_identity_auto_matrix_keeps_bypass() {
        let input = CompileInput {
            auto_enabled: true,
            ..CompileInput::default()
        };
        assert!(compile(&input).bypass);

        let input = CompileInput {
            auto_enabled: true,
            auto_matrix: ColorMatrix::saturation(1.2),
            ..CompileInput::default()
        };
        let pipeline = compile(&input);
        assert!(!pipeline.bypass);
        assert!(pipeline.graph.validate());
    }

    #[test]
    fn test_disabled_auto_ignores_matrix() {
        let input = CompileInput {
            auto_enabled: false,
            auto_matrix: ColorMatrix::saturation(1.2),
            ..CompileInput::default()
        };
        assert!(compile(&input).bypass);
    }

    #[test]
    fn test_profile_only_keeps_uniform_detail_stage() {
        let input = CompileInput {
            profile: Profile::Cinematic,
            ..CompileInput::default()
        };
        let pipeline = compile(&input);
        assert_eq!(
            pipeline.operations[0],
            ColorOperation::Blur {
                sigma: ops::NOOP_BLUR_SIGMA
            }
        );
        assert!(pipeline.is_finite());
    }

    #[test]
    fn test_description_is_stable() {
        let mut params = ParameterSet::default();
        params.hdr = 1.5;
        params.white = -0.4;
        let input = CompileInput {
            params,
            profile: Profile::Animation,
            ..CompileInput::default()
        };
        assert_eq!(compile(&input).description(), compile(&input).description());
    }
}
