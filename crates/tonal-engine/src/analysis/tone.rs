//! Target derivation and smoothing of the auto-correction tone.

use serde::{Deserialize, Serialize};

use super::config::AnalysisConfig;
use crate::matrix::ColorMatrix;
use crate::stats::FrameStats;

const TARGET_LUMA: f64 = 0.50;
const TARGET_STD: f64 = 0.23;
const TARGET_CHROMA: f64 = 0.12;

const BRIGHTNESS_GAIN: f64 = 0.85;
const CONTRAST_GAIN: f64 = 0.85;
const SATURATION_GAIN: f64 = 0.90;
const HUE_GAIN: f64 = 28.0;

const BRIGHTNESS_RANGE: (f64, f64) = (0.78, 1.22);
const CONTRAST_RANGE: (f64, f64) = (0.82, 1.30);
const SATURATION_RANGE: (f64, f64) = (0.80, 1.45);
const HUE_LIMIT: f64 = 10.0;

/// Brightness, contrast and saturation factors plus a hue offset in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneParams {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub hue: f64,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl ToneParams {
    pub const NEUTRAL: ToneParams = ToneParams {
        brightness: 1.0,
        contrast: 1.0,
        saturation: 1.0,
        hue: 0.0,
    };

    /// Targets that move the smoothed statistics toward the reference look.
    pub fn derive(ema: &FrameStats, strength: f64, lock_white_balance: bool) -> ToneParams {
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let toward = |raw: f64, (lo, hi): (f64, f64)| (1.0 + (raw.clamp(lo, hi) - 1.0) * strength).clamp(lo, hi);

        let brightness = 1.0 + BRIGHTNESS_GAIN * (TARGET_LUMA - ema.mean_luma) / TARGET_LUMA;
        let contrast = 1.0 + CONTRAST_GAIN * (TARGET_STD - ema.std_luma) / TARGET_STD;
        let saturation = 1.0 + SATURATION_GAIN * (TARGET_CHROMA - ema.mean_chroma) / TARGET_CHROMA;
        let hue = if lock_white_balance {
            (-ema.rb_balance() * HUE_GAIN).clamp(-HUE_LIMIT, HUE_LIMIT) * strength
        } else {
            0.0
        };

        ToneParams {
            brightness: toward(brightness, BRIGHTNESS_RANGE),
            contrast: toward(contrast, CONTRAST_RANGE),
            saturation: toward(saturation, SATURATION_RANGE),
            hue: hue.clamp(-HUE_LIMIT, HUE_LIMIT),
        }
    }

    /// One exponential step toward `target` with dead-zone snapping.
    pub fn approach(&self, target: &ToneParams, step: f64, config: &AnalysisConfig) -> ToneParams {
        let scalar = |current: f64, target: f64| {
            if (target - current).abs() <= config.tone_dead_zone {
                target
            } else {
                current + (target - current) * step
            }
        };

        let delta = wrap_hue(target.hue - self.hue);
        let hue = if delta.abs() <= config.hue_dead_zone {
            wrap_hue(target.hue)
        } else {
            wrap_hue(self.hue + delta * step)
        };

        ToneParams {
            brightness: scalar(self.brightness, target.brightness),
            contrast: scalar(self.contrast, target.contrast),
            saturation: scalar(self.saturation, target.saturation),
            hue,
        }
    }

    /// `hue_rotate ∘ saturation ∘ brightness_contrast`.
    pub fn to_matrix(&self) -> ColorMatrix {
        ColorMatrix::hue_rotate(self.hue)
            .multiply(&ColorMatrix::saturation(self.saturation))
            .multiply(&ColorMatrix::brightness_contrast(self.brightness, self.contrast))
    }
}

/// Wrap degrees into (-180, 180].
pub fn wrap_hue(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_stats_give_neutral_targets() {
        let t = ToneParams::derive(&FrameStats::NEUTRAL, 1.0, true);
        assert!((t.brightness - 1.0).abs() < 1e-12);
        assert!((t.contrast - 1.0).abs() < 1e-12);
        assert!((t.saturation - 1.0).abs() < 1e-12);
        assert!(t.hue.abs() < 1e-12);
        assert!(t.to_matrix().is_identity(1e-12));
    }

    #[test]
    fn test_dark_frame_brightens_within_bounds() {
        let dark = FrameStats {
            mean_luma: 0.1,
            std_luma: 0.05,
            mean_chroma: 0.01,
            ..FrameStats::NEUTRAL
        };
        let t = ToneParams::derive(&dark, 1.0, false);
        assert_eq!(t.brightness, 1.22);
        assert_eq!(t.contrast, 1.30);
        assert_eq!(t.saturation, 1.45);
        let half = ToneParams::derive(&dark, 0.5, false);
        assert!((half.brightness - 1.11).abs() < 1e-12);
    }

    #[test]
    fn test_zero_strength_is_exact_identity() {
        let skewed = FrameStats {
            mean_r: 0.9,
            mean_b: 0.1,
            mean_luma: 0.9,
            std_luma: 0.01,
            mean_chroma: 0.5,
            ..FrameStats::NEUTRAL
        };
        let t = ToneParams::derive(&skewed, 0.0, true);
        assert_eq!(t, ToneParams::NEUTRAL);
        assert_eq!(t.to_matrix(), ColorMatrix::IDENTITY);
    }

    #[test]
    fn test_white_balance_hue() {
        let warm = FrameStats {
            mean_r: 0.7,
            mean_b: 0.4,
            ..FrameStats::NEUTRAL
        };
        assert_eq!(ToneParams::derive(&warm, 1.0, false).hue, 0.0);
        let hue = ToneParams::derive(&warm, 1.0, true).hue;
        assert!((hue + 8.4).abs() < 1e-9);
    }

    #[test]
    fn test_hue_wraps_through_boundary() {
        let config = AnalysisConfig::default();
        let mut current = ToneParams {
            hue: 170.0,
            ..ToneParams::NEUTRAL
        };
        let target = ToneParams {
            hue: -170.0,
            ..ToneParams::NEUTRAL
        };
        let mut crossed = false;
        for _ in 0..200 {
            let next = current.approach(&target, 0.16, &config);
            assert!(next.hue > -180.0 && next.hue <= 180.0);
            if current.hue > 0.0 && next.hue < 0.0 {
                crossed = true;
                assert!(current.hue > 170.0);
            }
            assert!(!(next.hue > -170.0 && next.hue < 170.0), "took the long way: {}", next.hue);
            current = next;
        }
        assert!(crossed);
        assert_eq!(current.hue, -170.0);
    }

    #[test]
    fn test_dead_zone_snaps() {
        let config = AnalysisConfig::default();
        let current = ToneParams {
            brightness: 1.002,
            ..ToneParams::NEUTRAL
        };
        let next = current.approach(&ToneParams::NEUTRAL, 0.05, &config);
        assert_eq!(next.brightness, 1.0);
    }

    #[test]
    fn test_wrap_hue() {
        assert_eq!(wrap_hue(180.0), 180.0);
        assert_eq!(wrap_hue(-180.0), 180.0);
        assert_eq!(wrap_hue(190.0), -170.0);
        assert_eq!(wrap_hue(-190.0), 170.0);
    }
}
