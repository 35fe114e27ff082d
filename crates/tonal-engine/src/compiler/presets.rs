//! Profile tone matrices, the user bank and stylistic grades.

use tonal_models::{ParameterSet, Profile, StyleToggles};

use crate::matrix::ColorMatrix;

/// Vibrance applied by the `vibrant` toggle.
pub const STYLE_VIBRANCE: f64 = 0.35;

/// Preset matrix for `profile`, with its saturation trim folded in.
///
/// `Off` has no matrix; `User` builds one from the user bank.
pub fn profile_matrix(profile: Profile, params: &ParameterSet) -> Option<ColorMatrix> {
    let (tone, trim) = match profile {
        Profile::Off => return None,
        Profile::User => return Some(UserBank::from_params(params).matrix()),
        Profile::Cinematic => (
            ColorMatrix::brightness_contrast(0.98, 1.12)
                .multiply(&ColorMatrix::channel_gain(1.03, 1.0, 0.97)),
            0.90,
        ),
        Profile::Animation => (ColorMatrix::brightness_contrast(1.02, 1.06), 1.20),
        Profile::Gaming => (ColorMatrix::brightness_contrast(1.05, 1.15), 1.10),
        Profile::EyeComfort => (
            ColorMatrix::channel_gain(1.0, 0.92, 0.72)
                .multiply(&ColorMatrix::brightness_contrast(0.95, 0.95)),
            0.95,
        ),
    };
    Some(ColorMatrix::saturation(trim).multiply(&tone))
}

/// Combined moody and teal/orange grade, applied in that order.
pub fn style_matrix(toggles: &StyleToggles) -> Option<ColorMatrix> {
    let mut out: Option<ColorMatrix> = None;
    if toggles.moody {
        out = Some(moody());
    }
    if toggles.teal_orange {
        let split = teal_orange();
        out = Some(match out {
            Some(m) => split.multiply(&m),
            None => split,
        });
    }
    out
}

pub fn moody() -> ColorMatrix {
    ColorMatrix::saturation(0.82)
        .multiply(&ColorMatrix::brightness_contrast(0.95, 1.10))
        .multiply(&ColorMatrix::channel_gain(0.97, 0.99, 1.04))
}

/// Warm highlights, cool shadows; rows sum to one so grays are preserved.
pub fn teal_orange() -> ColorMatrix {
    ColorMatrix::from_rows([
        [1.06, 0.0, -0.06, 0.0, 0.0],
        [-0.02, 1.02, 0.0, 0.0, 0.0],
        [-0.08, 0.0, 1.08, 0.0, 0.0],
    ])
}

/// User-bank values mapped to operator units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserBank {
    pub gain: [f64; 3],
    pub black_point: f64,
    pub white_point: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub hue: f64,
    pub gamma: f64,
    pub shadows: f64,
    pub highlights: f64,
    pub vibrance: f64,
    /// Added to the detail amount
    pub sharpen: f64,
    /// Added to grain alpha
    pub grain: f64,
}

impl UserBank {
    pub fn from_params(p: &ParameterSet) -> Self {
        Self {
            gain: [p.user_red / 100.0, p.user_green / 100.0, p.user_blue / 100.0],
            black_point: p.user_black / 500.0,
            white_point: 1.0 - p.user_white / 500.0,
            contrast: 1.0 + p.user_contrast / 100.0,
            saturation: 1.0 + p.user_saturation / 100.0,
            hue: p.user_hue,
            gamma: p.user_gamma / 100.0,
            shadows: p.user_shadows / 50.0,
            highlights: p.user_highlights / 50.0,
            vibrance: p.user_vibrance / 100.0,
            sharpen: p.user_sharpen / 50.0,
            grain: p.user_grain / 100.0 * 0.15,
        }
    }

    pub fn has_gain(&self) -> bool {
        self.gain != [1.0, 1.0, 1.0]
    }

    pub fn has_curve(&self) -> bool {
        self.gamma != 1.0 || self.shadows != 0.0 || self.highlights != 0.0
    }

    /// Levels, then contrast, then saturation, then hue.
    pub fn matrix(&self) -> ColorMatrix {
        ColorMatrix::hue_rotate(self.hue)
            .multiply(&ColorMatrix::saturation(self.saturation))
            .multiply(&ColorMatrix::brightness_contrast(1.0, self.contrast))
            .multiply(&self.levels())
    }

    fn levels(&self) -> ColorMatrix {
        let span = (self.white_point - self.black_point).max(0.05);
        let scale = 1.0 / span;
        let offset = -self.black_point * scale;
        ColorMatrix::from_rows([
            [scale, 0.0, 0.0, 0.0, offset],
            [0.0, scale, 0.0, 0.0, offset],
            [0.0, 0.0, scale, 0.0, offset],
        ])
    }
}
