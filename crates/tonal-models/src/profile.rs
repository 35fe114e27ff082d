//! Tone profiles and color-vision filter definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Named tone presets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// No profile matrix
    #[default]
    Off,
    /// Contrast lift, warm push, saturation trim
    Cinematic,
    /// Punchy flat colors
    Animation,
    /// Contrast and clarity for games
    Gaming,
    /// Warm shift with reduced blue
    EyeComfort,
    /// Matrix built from the user bank
    User,
}

impl Profile {
    pub const ALL: &'static [Profile] = &[
        Profile::Off,
        Profile::Cinematic,
        Profile::Animation,
        Profile::Gaming,
        Profile::EyeComfort,
        Profile::User,
    ];

    /// Returns the profile name as used in settings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Off => "off",
            Profile::Cinematic => "cinematic",
            Profile::Animation => "animation",
            Profile::Gaming => "gaming",
            Profile::EyeComfort => "eye_comfort",
            Profile::User => "user",
        }
    }

    /// Whether this profile contributes a fixed preset matrix.
    pub fn has_preset(&self) -> bool {
        !matches!(self, Profile::Off | Profile::User)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Profile {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "off" | "none" => Ok(Profile::Off),
            "cinematic" => Ok(Profile::Cinematic),
            "animation" | "anime" => Ok(Profile::Animation),
            "gaming" => Ok(Profile::Gaming),
            "eye_comfort" => Ok(Profile::EyeComfort),
            "user" => Ok(Profile::User),
            _ => Err(ProfileParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown profile: {0}")]
pub struct ProfileParseError(String);

/// Color-vision-deficiency simulation filter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ColorVisionFilter {
    #[default]
    None,
    Protanopia,
    Deuteranopia,
    Tritanomaly,
}

impl ColorVisionFilter {
    pub const ALL: &'static [ColorVisionFilter] = &[
        ColorVisionFilter::None,
        ColorVisionFilter::Protanopia,
        ColorVisionFilter::Deuteranopia,
        ColorVisionFilter::Tritanomaly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorVisionFilter::None => "none",
            ColorVisionFilter::Protanopia => "protanopia",
            ColorVisionFilter::Deuteranopia => "deuteranopia",
            ColorVisionFilter::Tritanomaly => "tritanomaly",
        }
    }
}

impl fmt::Display for ColorVisionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColorVisionFilter {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Ok(ColorVisionFilter::None),
            "protanopia" => Ok(ColorVisionFilter::Protanopia),
            "deuteranopia" => Ok(ColorVisionFilter::Deuteranopia),
            "tritanomaly" => Ok(ColorVisionFilter::Tritanomaly),
            _ => Err(ProfileParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_roundtrip() {
        for profile in Profile::ALL {
            assert_eq!(profile.as_str().parse::<Profile>().unwrap(), *profile);
        }
        assert_eq!("eye-comfort".parse::<Profile>().unwrap(), Profile::EyeComfort);
        assert!("vivid".parse::<Profile>().is_err());
    }

    #[test]
    fn test_profile_presets() {
        assert!(!Profile::Off.has_preset());
        assert!(!Profile::User.has_preset());
        assert!(Profile::Cinematic.has_preset());
    }

    #[test]
    fn test_vision_filter_serde() {
        let json = serde_json::to_string(&ColorVisionFilter::Tritanomaly).unwrap();
        assert_eq!(json, "\"tritanomaly\"");
        for filter in ColorVisionFilter::ALL {
            assert_eq!(filter.as_str().parse::<ColorVisionFilter>().unwrap(), *filter);
        }
    }
}
