//! Grading parameters, their valid ranges and quantization steps.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Step used by the top-level sliders.
pub const SLIDER_STEP: f64 = 0.1;
/// Step used by the user bank (percent / degree units).
pub const USER_STEP: f64 = 1.0;

/// Valid range, quantization step and neutral value of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Neutral value; snapping targets this value.
    pub default: f64,
}

impl ParamSpec {
    const fn new(min: f64, max: f64, step: f64, default: f64) -> Self {
        Self {
            min,
            max,
            step,
            default,
        }
    }

    /// Whether `value` lies inside the valid range.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Every tunable field of a [`ParameterSet`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ParamKey {
    /// Sharpen (positive) / blur (negative) balance
    Sharpen,
    /// Gaussian radius used by the high-pass sharpen
    Radius,
    /// Black-level offset
    Black,
    /// White-level / highlights rolloff
    White,
    /// Denoise (positive) / grain (negative) balance
    Denoise,
    /// HDR tone strength
    Hdr,
    UserContrast,
    UserBlack,
    UserWhite,
    UserHighlights,
    UserShadows,
    UserSaturation,
    UserVibrance,
    UserSharpen,
    UserGamma,
    UserGrain,
    UserHue,
    UserRed,
    UserGreen,
    UserBlue,
}

impl ParamKey {
    /// All keys in persisted-record order.
    pub const ALL: &'static [ParamKey] = &[
        ParamKey::Sharpen,
        ParamKey::Radius,
        ParamKey::Black,
        ParamKey::White,
        ParamKey::Denoise,
        ParamKey::Hdr,
        ParamKey::UserContrast,
        ParamKey::UserBlack,
        ParamKey::UserWhite,
        ParamKey::UserHighlights,
        ParamKey::UserShadows,
        ParamKey::UserSaturation,
        ParamKey::UserVibrance,
        ParamKey::UserSharpen,
        ParamKey::UserGamma,
        ParamKey::UserGrain,
        ParamKey::UserHue,
        ParamKey::UserRed,
        ParamKey::UserGreen,
        ParamKey::UserBlue,
    ];

    /// Range, step and neutral value for this key.
    pub fn spec(&self) -> ParamSpec {
        match self {
            ParamKey::Sharpen => ParamSpec::new(-2.0, 2.0, SLIDER_STEP, 0.0),
            ParamKey::Radius => ParamSpec::new(0.5, 3.0, SLIDER_STEP, 1.0),
            ParamKey::Black => ParamSpec::new(-2.0, 2.0, SLIDER_STEP, 0.0),
            ParamKey::White => ParamSpec::new(-2.0, 2.0, SLIDER_STEP, 0.0),
            ParamKey::Denoise => ParamSpec::new(-1.5, 1.5, SLIDER_STEP, 0.0),
            ParamKey::Hdr => ParamSpec::new(-1.0, 2.0, SLIDER_STEP, 0.0),
            ParamKey::UserContrast
            | ParamKey::UserBlack
            | ParamKey::UserWhite
            | ParamKey::UserHighlights
            | ParamKey::UserShadows
            | ParamKey::UserSaturation => ParamSpec::new(-50.0, 50.0, USER_STEP, 0.0),
            ParamKey::UserVibrance => ParamSpec::new(-50.0, 100.0, USER_STEP, 0.0),
            ParamKey::UserSharpen | ParamKey::UserGrain => {
                ParamSpec::new(0.0, 100.0, USER_STEP, 0.0)
            }
            ParamKey::UserGamma => ParamSpec::new(50.0, 200.0, USER_STEP, 100.0),
            ParamKey::UserHue => ParamSpec::new(-180.0, 180.0, USER_STEP, 0.0),
            ParamKey::UserRed | ParamKey::UserGreen | ParamKey::UserBlue => {
                ParamSpec::new(0.0, 200.0, USER_STEP, 100.0)
            }
        }
    }

    /// Field name as used in persisted records and update maps.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKey::Sharpen => "sharpen",
            ParamKey::Radius => "radius",
            ParamKey::Black => "black",
            ParamKey::White => "white",
            ParamKey::Denoise => "denoise",
            ParamKey::Hdr => "hdr",
            ParamKey::UserContrast => "user_contrast",
            ParamKey::UserBlack => "user_black",
            ParamKey::UserWhite => "user_white",
            ParamKey::UserHighlights => "user_highlights",
            ParamKey::UserShadows => "user_shadows",
            ParamKey::UserSaturation => "user_saturation",
            ParamKey::UserVibrance => "user_vibrance",
            ParamKey::UserSharpen => "user_sharpen",
            ParamKey::UserGamma => "user_gamma",
            ParamKey::UserGrain => "user_grain",
            ParamKey::UserHue => "user_hue",
            ParamKey::UserRed => "user_red",
            ParamKey::UserGreen => "user_green",
            ParamKey::UserBlue => "user_blue",
        }
    }

    /// Whether the key belongs to the user bank (active only with the user profile).
    pub fn is_user_bank(&self) -> bool {
        !matches!(
            self,
            ParamKey::Sharpen
                | ParamKey::Radius
                | ParamKey::Black
                | ParamKey::White
                | ParamKey::Denoise
                | ParamKey::Hdr
        )
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ParamKey {
    type Err = ParamKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase().replace('-', "_");
        ParamKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| ParamKeyParseError(s.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("Unknown parameter: {0}")]
pub struct ParamKeyParseError(String);

/// Canonical grading parameters.
///
/// Values are only meaningful after normalization; the engine never reads a
/// field that has not been clamped and quantized against [`ParamKey::spec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ParameterSet {
    pub sharpen: f64,
    pub radius: f64,
    pub black: f64,
    pub white: f64,
    pub denoise: f64,
    pub hdr: f64,
    pub user_contrast: f64,
    pub user_black: f64,
    pub user_white: f64,
    pub user_highlights: f64,
    pub user_shadows: f64,
    pub user_saturation: f64,
    pub user_vibrance: f64,
    pub user_sharpen: f64,
    pub user_gamma: f64,
    pub user_grain: f64,
    pub user_hue: f64,
    pub user_red: f64,
    pub user_green: f64,
    pub user_blue: f64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        let mut set = Self {
            sharpen: 0.0,
            radius: 0.0,
            black: 0.0,
            white: 0.0,
            denoise: 0.0,
            hdr: 0.0,
            user_contrast: 0.0,
            user_black: 0.0,
            user_white: 0.0,
            user_highlights: 0.0,
            user_shadows: 0.0,
            user_saturation: 0.0,
            user_vibrance: 0.0,
            user_sharpen: 0.0,
            user_gamma: 0.0,
            user_grain: 0.0,
            user_hue: 0.0,
            user_red: 0.0,
            user_green: 0.0,
            user_blue: 0.0,
        };
        for key in ParamKey::ALL {
            set.set(*key, key.spec().default);
        }
        set
    }
}

impl ParameterSet {
    /// Read one field.
    pub fn get(&self, key: ParamKey) -> f64 {
        match key {
            ParamKey::Sharpen => self.sharpen,
            ParamKey::Radius => self.radius,
            ParamKey::Black => self.black,
            ParamKey::White => self.white,
            ParamKey::Denoise => self.denoise,
            ParamKey::Hdr => self.hdr,
            ParamKey::UserContrast => self.user_contrast,
            ParamKey::UserBlack => self.user_black,
            ParamKey::UserWhite => self.user_white,
            ParamKey::UserHighlights => self.user_highlights,
            ParamKey::UserShadows => self.user_shadows,
            ParamKey::UserSaturation => self.user_saturation,
            ParamKey::UserVibrance => self.user_vibrance,
            ParamKey::UserSharpen => self.user_sharpen,
            ParamKey::UserGamma => self.user_gamma,
            ParamKey::UserGrain => self.user_grain,
            ParamKey::UserHue => self.user_hue,
            ParamKey::UserRed => self.user_red,
            ParamKey::UserGreen => self.user_green,
            ParamKey::UserBlue => self.user_blue,
        }
    }

    /// Write one field without validation.
    pub fn set(&mut self, key: ParamKey, value: f64) {
        let slot = match key {
            ParamKey::Sharpen => &mut self.sharpen,
            ParamKey::Radius => &mut self.radius,
            ParamKey::Black => &mut self.black,
            ParamKey::White => &mut self.white,
            ParamKey::Denoise => &mut self.denoise,
            ParamKey::Hdr => &mut self.hdr,
            ParamKey::UserContrast => &mut self.user_contrast,
            ParamKey::UserBlack => &mut self.user_black,
            ParamKey::UserWhite => &mut self.user_white,
            ParamKey::UserHighlights => &mut self.user_highlights,
            ParamKey::UserShadows => &mut self.user_shadows,
            ParamKey::UserSaturation => &mut self.user_saturation,
            ParamKey::UserVibrance => &mut self.user_vibrance,
            ParamKey::UserSharpen => &mut self.user_sharpen,
            ParamKey::UserGamma => &mut self.user_gamma,
            ParamKey::UserGrain => &mut self.user_grain,
            ParamKey::UserHue => &mut self.user_hue,
            ParamKey::UserRed => &mut self.user_red,
            ParamKey::UserGreen => &mut self.user_green,
            ParamKey::UserBlue => &mut self.user_blue,
        };
        *slot = value;
    }

    /// Whether every field outside the user bank sits at its neutral value.
    pub fn sliders_neutral(&self) -> bool {
        ParamKey::ALL
            .iter()
            .filter(|k| !k.is_user_bank())
            .all(|k| self.get(*k) == k.spec().default)
    }

    /// Whether every user-bank field sits at its neutral value.
    pub fn user_bank_neutral(&self) -> bool {
        ParamKey::ALL
            .iter()
            .filter(|k| k.is_user_bank())
            .all(|k| self.get(*k) == k.spec().default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_neutral() {
        let set = ParameterSet::default();
        assert_eq!(set.radius, 1.0);
        assert_eq!(set.user_gamma, 100.0);
        assert_eq!(set.user_red, 100.0);
        assert!(set.sliders_neutral());
        assert!(set.user_bank_neutral());
    }

    #[test]
    fn test_defaults_inside_ranges() {
        for key in ParamKey::ALL {
            let spec = key.spec();
            assert!(spec.contains(spec.default), "{key} default out of range");
            assert!(spec.step > 0.0);
        }
    }

    #[test]
    fn test_get_set_roundtrip_every_key() {
        let mut set = ParameterSet::default();
        for (i, key) in ParamKey::ALL.iter().enumerate() {
            set.set(*key, i as f64);
        }
        for (i, key) in ParamKey::ALL.iter().enumerate() {
            assert_eq!(set.get(*key), i as f64);
        }
    }

    #[test]
    fn test_key_parse() {
        assert_eq!("user_hue".parse::<ParamKey>().unwrap(), ParamKey::UserHue);
        assert_eq!("User-Red".parse::<ParamKey>().unwrap(), ParamKey::UserRed);
        assert!("exposure".parse::<ParamKey>().is_err());
    }

    #[test]
    fn test_key_serde_matches_as_str() {
        for key in ParamKey::ALL {
            let json = serde_json::to_string(key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let set: ParameterSet = serde_json::from_str(r#"{"sharpen": 0.5}"#).unwrap();
        assert_eq!(set.sharpen, 0.5);
        assert_eq!(set.user_gamma, 100.0);
    }
}
