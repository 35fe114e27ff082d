//! Engine-wide settings and the compiled-pipeline cache.
//!
//! Settings are replaced whole: an update reads the current snapshot,
//! normalizes into a new one and swaps it in. The compiled pipeline is
//! rebuilt whenever the settings or the auto-matrix change.

use tonal_models::{
    AutoConfig, ColorVisionFilter, ParameterSet, ParameterUpdate, PersistedSettings, Profile,
    RenderMode, StyleToggles,
};
use tracing::{debug, info, warn};

use crate::analysis::AutoMatrix;
use crate::compiler::{compile, BackendSelector, CompileInput, CompiledPipeline, PlanOutcome, ShaderBackend};
use crate::matrix::ColorMatrix;
use crate::normalize::Normalizer;

/// Normalized user-facing settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineSettings {
    pub params: ParameterSet,
    pub profile: Profile,
    pub color_vision_filter: ColorVisionFilter,
    pub toggles: StyleToggles,
    pub render_mode: RenderMode,
    pub auto: AutoConfig,
}

impl EngineSettings {
    /// New snapshot with `update` applied; absent fields are kept.
    pub fn apply_update(&self, update: &ParameterUpdate, normalizer: &Normalizer) -> EngineSettings {
        let mut auto = self.auto;
        if let Some(enabled) = update.auto_enabled {
            auto.enabled = enabled;
        }
        if let Some(strength) = update.auto_strength {
            auto.strength = normalizer.normalize_strength(strength);
        }
        if let Some(lock) = update.auto_lock_wb {
            auto.lock_white_balance = lock;
        }

        EngineSettings {
            params: normalizer.apply(&self.params, update),
            profile: update.profile.unwrap_or(self.profile),
            color_vision_filter: update.color_vision_filter.unwrap_or(self.color_vision_filter),
            toggles: update.toggles.unwrap_or(self.toggles),
            render_mode: update.render_mode.unwrap_or(self.render_mode),
            auto,
        }
    }

    /// Load a persisted record through normalization.
    pub fn from_persisted(record: &PersistedSettings, normalizer: &Normalizer) -> EngineSettings {
        EngineSettings::default().apply_update(&record.to_update(), normalizer)
    }

    pub fn to_persisted(&self) -> PersistedSettings {
        PersistedSettings::new(
            &self.params,
            self.profile,
            self.render_mode,
            &self.auto,
            self.color_vision_filter,
        )
    }
}

/// Settings, latest auto-matrix, backend choice and the pipeline compiled from them.
#[derive(Debug, Clone)]
pub struct EngineState {
    settings: EngineSettings,
    normalizer: Normalizer,
    selector: BackendSelector,
    auto_matrix: ColorMatrix,
    auto_generation: u64,
    pipeline: CompiledPipeline,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl EngineState {
    pub fn new(settings: EngineSettings) -> Self {
        let normalizer = Normalizer::new();
        let settings = EngineSettings {
            params: normalizer.normalize_set(&settings.params),
            auto: AutoConfig {
                strength: normalizer.normalize_strength(settings.auto.strength),
                ..settings.auto
            },
            ..settings
        };
        let mut state = Self {
            selector: BackendSelector::new(settings.render_mode),
            settings,
            normalizer,
            auto_matrix: ColorMatrix::IDENTITY,
            auto_generation: 0,
            pipeline: CompiledPipeline::bypass(),
        };
        state.recompile();
        state
    }

    pub fn from_persisted(record: &PersistedSettings) -> Self {
        Self::new(EngineSettings::from_persisted(record, &Normalizer::new()))
    }

    /// Load from a persisted JSON record; unreadable or foreign records give defaults.
    pub fn from_persisted_json(json: &str) -> Self {
        match PersistedSettings::from_json(json) {
            Ok(record) => Self::from_persisted(&record),
            Err(e) => {
                warn!(error = %e, "Ignoring persisted settings, using defaults");
                Self::default()
            }
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn pipeline(&self) -> &CompiledPipeline {
        &self.pipeline
    }

    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    pub fn auto_generation(&self) -> u64 {
        self.auto_generation
    }

    /// Apply a partial update. Returns whether the pipeline changed.
    pub fn apply_update(&mut self, update: &ParameterUpdate) -> bool {
        if update.is_empty() {
            return false;
        }
        let next = self.settings.apply_update(update, &self.normalizer);
        if next == self.settings {
            return false;
        }
        if next.render_mode != self.settings.render_mode {
            info!(mode = %next.render_mode, "Render mode changed");
            self.selector.set_preferred(next.render_mode);
            self.selector.reset();
        }
        if next.auto.enabled != self.settings.auto.enabled && !next.auto.enabled {
            self.auto_matrix = ColorMatrix::IDENTITY;
        }
        self.settings = next;
        self.recompile()
    }

    /// Adopt a newly published auto-matrix. Returns whether the pipeline changed.
    pub fn set_auto_matrix(&mut self, published: &AutoMatrix) -> bool {
        if published.generation != 0 && published.generation <= self.auto_generation {
            return false;
        }
        self.auto_generation = published.generation;
        if published.matrix == self.auto_matrix {
            return false;
        }
        self.auto_matrix = published.matrix;
        self.recompile()
    }

    pub fn compile_input(&self) -> CompileInput {
        CompileInput {
            params: self.settings.params.clone(),
            profile: self.settings.profile,
            color_vision_filter: self.settings.color_vision_filter,
            toggles: self.settings.toggles,
            auto_enabled: self.settings.auto.enabled,
            auto_matrix: self.auto_matrix,
        }
    }

    /// Pick the render plan for the current pipeline.
    pub fn plan(&mut self, backend: &dyn ShaderBackend) -> PlanOutcome {
        self.selector.plan(&self.pipeline, backend)
    }

    pub fn persisted(&self) -> PersistedSettings {
        self.settings.to_persisted()
    }

    fn recompile(&mut self) -> bool {
        let next = compile(&self.compile_input());
        if next == self.pipeline {
            return false;
        }
        debug!(
            bypass = next.bypass,
            operations = next.operations.len(),
            nodes = next.graph.nodes.len(),
            "Pipeline recompiled"
        );
        self.pipeline = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CpuShaderBackend;
    use std::time::Instant;
    use tonal_models::ParamKey;

    #[test]
    fn test_default_state_is_bypass() {
        let state = EngineState::default();
        assert!(state.pipeline().bypass);
    }

    #[test]
    fn test_update_is_normalized_and_partial() {
        let mut state = EngineState::default();
        assert!(state.apply_update(
            &ParameterUpdate::new()
                .with_param(ParamKey::Sharpen, 99.0)
                .with_profile(Profile::Cinematic)
        ));
        assert_eq!(state.settings().params.sharpen, ParamKey::Sharpen.spec().max);
        assert!(!state.pipeline().bypass);

        state.apply_update(&ParameterUpdate::new().with_param(ParamKey::Hdr, 1.0));
        assert_eq!(state.settings().profile, Profile::Cinematic);
        assert_eq!(state.settings().params.sharpen, ParamKey::Sharpen.spec().max);
    }

    #[test]
    fn test_repeated_update_is_idempotent() {
        let mut state = EngineState::default();
        let update = ParameterUpdate::new().with_param(ParamKey::Hdr, 1.234);
        assert!(state.apply_update(&update));
        let description = state.pipeline().description();
        assert!(!state.apply_update(&update));
        assert_eq!(state.pipeline().description(), description);
    }

    #[test]
    fn test_auto_matrix_recompiles_only_when_enabled() {
        let mut state = EngineState::default();
        let published = AutoMatrix {
            matrix: ColorMatrix::saturation(1.2),
            generation: 1,
            updated_at: Instant::now(),
        };
        state.set_auto_matrix(&published);
        assert!(state.pipeline().bypass);

        assert!(state.apply_update(&ParameterUpdate::new().with_auto(true)));
        assert!(!state.pipeline().bypass);

        // Disabling clears the matrix.
        state.apply_update(&ParameterUpdate::new().with_auto(false));
        assert!(state.pipeline().bypass);
        assert_eq!(state.compile_input().auto_matrix, ColorMatrix::IDENTITY);
    }

    #[test]
    fn test_stale_generation_ignored() {
        let mut state = EngineState::new(EngineSettings {
            auto: AutoConfig {
                enabled: true,
                ..AutoConfig::default()
            },
            ..EngineSettings::default()
        });
        let now = Instant::now();
        assert!(state.set_auto_matrix(&AutoMatrix {
            matrix: ColorMatrix::saturation(1.2),
            generation: 3,
            updated_at: now,
        }));
        assert!(!state.set_auto_matrix(&AutoMatrix {
            matrix: ColorMatrix::saturation(0.8),
            generation: 2,
            updated_at: now,
        }));
    }

    #[test]
    fn test_persisted_roundtrip() {
        let mut state = EngineState::default();
        state.apply_update(
            &ParameterUpdate::new()
                .with_param(ParamKey::Hdr, 1.5)
                .with_render_mode(RenderMode::Shader)
                .with_auto_strength(0.333),
        );
        let record = state.persisted();
        assert_eq!(record.auto_strength, 0.33);
        let loaded = EngineState::from_persisted(&record);
        assert_eq!(loaded.settings().params.hdr, 1.5);
        assert_eq!(loaded.settings().render_mode, RenderMode::Shader);
    }

    #[test]
    fn test_foreign_schema_loads_defaults() {
        let state = EngineState::from_persisted_json(r#"{"schema": "other/v9", "hdr": 2.0}"#);
        assert_eq!(state.settings(), &EngineSettings::default());

        let json = EngineState::default().persisted().to_json().unwrap();
        let state = EngineState::from_persisted_json(&json);
        assert_eq!(state.settings(), &EngineSettings::default());
    }

    #[test]
    fn test_plan_uses_preferred_backend() {
        let mut state = EngineState::default();
        state.apply_update(
            &ParameterUpdate::new()
                .with_param(ParamKey::Hdr, 1.0)
                .with_render_mode(RenderMode::Shader),
        );
        let outcome = state.plan(&CpuShaderBackend);
        assert_eq!(outcome.plan.mode(), RenderMode::Shader);
    }
}
