//! Auto-correction configuration and partial parameter updates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::param::ParamKey;
use crate::profile::{ColorVisionFilter, Profile};
use crate::toggles::{RenderMode, StyleToggles};

/// Default auto-correction strength
pub const DEFAULT_AUTO_STRENGTH: f64 = 0.65;

/// Scene-match auto-correction settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AutoConfig {
    /// Whether the analysis loop runs
    pub enabled: bool,
    /// Global strength in [0, 1] scaling every derived target toward neutral
    pub strength: f64,
    /// Derive a hue offset that opposes red/blue imbalance
    pub lock_white_balance: bool,
}

impl Default for AutoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: DEFAULT_AUTO_STRENGTH,
            lock_white_balance: false,
        }
    }
}

/// A partial settings delta pushed by a UI or storage collaborator.
///
/// Absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ParameterUpdate {
    /// Raw (unnormalized) parameter values
    pub params: BTreeMap<ParamKey, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_vision_filter: Option<ColorVisionFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toggles: Option<StyleToggles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_mode: Option<RenderMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_lock_wb: Option<bool>,
}

impl ParameterUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw parameter value.
    pub fn with_param(mut self, key: ParamKey, value: f64) -> Self {
        self.params.insert(key, value);
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_vision_filter(mut self, filter: ColorVisionFilter) -> Self {
        self.color_vision_filter = Some(filter);
        self
    }

    pub fn with_toggles(mut self, toggles: StyleToggles) -> Self {
        self.toggles = Some(toggles);
        self
    }

    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = Some(mode);
        self
    }

    /// Enable or disable auto-correction.
    pub fn with_auto(mut self, enabled: bool) -> Self {
        self.auto_enabled = Some(enabled);
        self
    }

    pub fn with_auto_strength(mut self, strength: f64) -> Self {
        self.auto_strength = Some(strength);
        self
    }

    pub fn with_auto_lock_wb(mut self, lock: bool) -> Self {
        self.auto_lock_wb = Some(lock);
        self
    }

    /// Whether the update carries no changes.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
            && self.profile.is_none()
            && self.color_vision_filter.is_none()
            && self.toggles.is_none()
            && self.render_mode.is_none()
            && self.auto_enabled.is_none()
            && self.auto_strength.is_none()
            && self.auto_lock_wb.is_none()
    }
}
