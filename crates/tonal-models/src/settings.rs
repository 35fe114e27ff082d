//! Persisted settings record.
//!
//! The settings collaborator owns storage; this module only fixes the schema.
//! Parameters are stored at one decimal of precision and the auto strength
//! at two.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::param::{ParamKey, ParameterSet};
use crate::profile::{ColorVisionFilter, Profile};
use crate::toggles::RenderMode;
use crate::update::{AutoConfig, ParameterUpdate};

/// Versioned schema tag written into every record.
pub const SETTINGS_SCHEMA: &str = "tonal.settings/v1";

/// Errors raised while loading model records.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unsupported settings schema: {0}")]
    UnsupportedSchema(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flat persisted settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PersistedSettings {
    /// Schema tag, always [`SETTINGS_SCHEMA`] when written by this crate
    pub schema: String,
    #[serde(flatten)]
    pub params: ParameterSet,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub render_mode: RenderMode,
    #[serde(default)]
    pub auto_on: bool,
    #[serde(default = "default_auto_strength")]
    pub auto_strength: f64,
    #[serde(default)]
    pub auto_lock_wb: bool,
    #[serde(default)]
    pub color_vision_filter: ColorVisionFilter,
}

fn default_auto_strength() -> f64 {
    AutoConfig::default().strength
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self::new(
            &ParameterSet::default(),
            Profile::default(),
            RenderMode::default(),
            &AutoConfig::default(),
            ColorVisionFilter::default(),
        )
    }
}

impl PersistedSettings {
    /// Build a record, rounding values to their persisted precision.
    pub fn new(
        params: &ParameterSet,
        profile: Profile,
        render_mode: RenderMode,
        auto: &AutoConfig,
        color_vision_filter: ColorVisionFilter,
    ) -> Self {
        let mut rounded = params.clone();
        for key in ParamKey::ALL {
            rounded.set(*key, round_to(params.get(*key), 1));
        }
        Self {
            schema: SETTINGS_SCHEMA.to_string(),
            params: rounded,
            profile,
            render_mode,
            auto_on: auto.enabled,
            auto_strength: round_to(auto.strength, 2),
            auto_lock_wb: auto.lock_white_balance,
            color_vision_filter,
        }
    }

    /// Parse a record, rejecting foreign schema tags.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let record: Self = serde_json::from_str(json)?;
        if record.schema != SETTINGS_SCHEMA {
            return Err(ModelError::UnsupportedSchema(record.schema));
        }
        Ok(record)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Auto-correction settings carried by the record.
    pub fn auto_config(&self) -> AutoConfig {
        AutoConfig {
            enabled: self.auto_on,
            strength: self.auto_strength,
            lock_white_balance: self.auto_lock_wb,
        }
    }

    /// Express the record as a full update so it flows through normalization.
    pub fn to_update(&self) -> ParameterUpdate {
        let mut update = ParameterUpdate::new()
            .with_profile(self.profile)
            .with_render_mode(self.render_mode)
            .with_vision_filter(self.color_vision_filter)
            .with_auto(self.auto_on)
            .with_auto_strength(self.auto_strength)
            .with_auto_lock_wb(self.auto_lock_wb);
        for key in ParamKey::ALL {
            update = update.with_param(*key, self.params.get(*key));
        }
        update
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_precision() {
        let mut params = ParameterSet::default();
        params.sharpen = 0.4449;
        params.user_hue = 12.26;
        let auto = AutoConfig {
            enabled: true,
            strength: 0.3333,
            lock_white_balance: true,
        };
        let record = PersistedSettings::new(
            &params,
            Profile::Cinematic,
            RenderMode::Shader,
            &auto,
            ColorVisionFilter::None,
        );
        assert_eq!(record.params.sharpen, 0.4);
        assert_eq!(record.params.user_hue, 12.3);
        assert_eq!(record.auto_strength, 0.33);
        assert_eq!(record.schema, SETTINGS_SCHEMA);
    }

    #[test]
    fn test_json_is_flat() {
        let json = PersistedSettings::default().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("sharpen").is_some());
        assert!(value.get("user_gamma").is_some());
        assert!(value.get("params").is_none());
        assert_eq!(value["profile"], "off");
    }

    #[test]
    fn test_json_roundtrip() {
        let mut record = PersistedSettings::default();
        record.profile = Profile::Gaming;
        record.params.hdr = 1.5;
        let json = record.to_json().unwrap();
        let loaded = PersistedSettings::from_json(&json).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_foreign_schema_rejected() {
        let json = r#"{"schema": "tonal.settings/v0", "sharpen": 1.0}"#;
        let err = PersistedSettings::from_json(json).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedSchema(_)));
    }

    #[test]
    fn test_json_schema_lists_flat_fields() {
        let schema = serde_json::to_value(schemars::schema_for!(PersistedSettings)).unwrap();
        let properties = &schema["properties"];
        assert!(properties.get("schema").is_some());
        assert!(properties.get("user_hue").is_some());
        assert!(properties.get("auto_lock_wb").is_some());
    }

    #[test]
    fn test_to_update_carries_every_param() {
        let update = PersistedSettings::default().to_update();
        assert_eq!(update.params.len(), ParamKey::ALL.len());
        assert_eq!(update.auto_enabled, Some(false));
    }
}
