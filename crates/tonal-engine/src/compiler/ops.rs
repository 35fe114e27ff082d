//! Backend-agnostic color operations and the fixed stage order.

use serde::{Deserialize, Serialize};
use tonal_models::{ColorVisionFilter, Profile};

use super::presets::{self, UserBank, STYLE_VIBRANCE};
use super::tone;
use super::CompileInput;
use crate::matrix::ColorMatrix;

/// Radius used when the detail stage is neutral.
pub const NOOP_BLUR_SIGMA: f64 = 0.01;
/// Clarity kernel for positive HDR.
pub const CLARITY_SIGMA: f64 = 2.5;
/// Fixed grain seed so compiled pipelines are reproducible.
pub const GRAIN_SEED: u32 = 7;

const BLACK_SCALE: f64 = 0.04;
const GRAIN_SCALE: f64 = 0.20 / 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixStage {
    HdrGain,
    HdrSaturation,
    ColorVision,
    Profile,
    Style,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    Highlights,
    HdrS,
    User,
}

/// One primitive of the compiled pipeline.
///
/// Every operation clamps its output to [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ColorOperation {
    Gain { r: f64, g: f64, b: f64 },
    Offset { amount: f64 },
    ToneCurve { kind: CurveKind, table: Vec<f64> },
    Matrix { stage: MatrixStage, matrix: ColorMatrix },
    Blur { sigma: f64 },
    /// `x + amount · (x − blur(x))`, mixed back with `blend`
    SharpenHighpass { amount: f64, sigma: f64, blend: f64 },
    /// `mix(x, blur(x), mix)`
    DenoiseBlend { mix: f64, sigma: f64 },
    GrainSynthesis { alpha: f64, seed: u32 },
    Vibrance { amount: f64 },
}

impl ColorOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gain { .. } => "gain",
            Self::Offset { .. } => "offset",
            Self::ToneCurve { .. } => "tone_curve",
            Self::Matrix { .. } => "matrix",
            Self::Blur { .. } => "blur",
            Self::SharpenHighpass { .. } => "sharpen_highpass",
            Self::DenoiseBlend { .. } => "denoise_blend",
            Self::GrainSynthesis { .. } => "grain_synthesis",
            Self::Vibrance { .. } => "vibrance",
        }
    }

    /// Whether the operation reads neighboring pixels.
    pub fn is_spatial(&self) -> bool {
        matches!(
            self,
            Self::Blur { .. } | Self::SharpenHighpass { .. } | Self::DenoiseBlend { .. }
        )
    }
}

/// Signed detail amount: positive sharpens, negative softens.
pub fn detail_amount(input: &CompileInput) -> f64 {
    let user = if input.profile == Profile::User {
        UserBank::from_params(&input.params).sharpen
    } else {
        0.0
    };
    (input.params.sharpen + user).clamp(-2.0, 2.0)
}

pub fn black_offset(input: &CompileInput) -> f64 {
    input.params.black.clamp(-2.0, 2.0) * BLACK_SCALE
}

/// `(mix, sigma)` of the denoise stage, if active.
pub fn denoise(input: &CompileInput) -> Option<(f64, f64)> {
    let d = input.params.denoise.clamp(0.0, 1.5);
    (d > 0.0).then(|| (d * 0.5, d * 0.8))
}

/// Grain alpha, zero when denoising.
pub fn grain_alpha(input: &CompileInput) -> f64 {
    if input.params.denoise > 0.0 {
        return 0.0;
    }
    let mut alpha = (-input.params.denoise).clamp(0.0, 1.5) * GRAIN_SCALE;
    if input.profile == Profile::User {
        alpha += UserBank::from_params(&input.params).grain;
    }
    alpha
}

/// Positive HDR parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HdrBoost {
    pub strength: f64,
    pub clarity: f64,
    pub blend: f64,
    pub slope: f64,
    pub intercept: f64,
    pub saturation: f64,
}

impl HdrBoost {
    pub fn new(s: f64) -> Self {
        Self {
            strength: s,
            clarity: 0.55 + 0.55 * s,
            blend: (0.65 + 0.12 * s).min(0.89),
            slope: 1.10 + 0.18 * s,
            intercept: -0.015 + 0.006 * s,
            saturation: 1.10 + 0.30 * s,
        }
    }

    pub fn gain_matrix(&self) -> ColorMatrix {
        let (k, c) = (self.slope, self.intercept);
        ColorMatrix::from_rows([
            [k, 0.0, 0.0, 0.0, c],
            [0.0, k, 0.0, 0.0, c],
            [0.0, 0.0, k, 0.0, c],
        ])
    }
}

/// Negative HDR parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HdrSoften {
    pub strength: f64,
    pub mix: f64,
    pub sigma: f64,
    pub saturation: f64,
}

impl HdrSoften {
    pub fn new(s: f64) -> Self {
        Self {
            strength: s,
            mix: 0.55 * s,
            sigma: 0.9 + 1.8 * s,
            saturation: 1.0 - 0.18 * s,
        }
    }
}

pub enum Hdr {
    Boost(HdrBoost),
    Soften(HdrSoften),
}

pub fn hdr(input: &CompileInput) -> Option<Hdr> {
    let h = input.params.hdr;
    if h > 0.0 {
        Some(Hdr::Boost(HdrBoost::new(h.clamp(0.0, 2.0))))
    } else if h < 0.0 {
        Some(Hdr::Soften(HdrSoften::new((-h).clamp(0.0, 1.0))))
    } else {
        None
    }
}

/// Ordered operation list for a non-bypass pipeline.
pub fn plan_operations(input: &CompileInput) -> Vec<ColorOperation> {
    let params = &input.params;
    let user = (input.profile == Profile::User).then(|| UserBank::from_params(params));
    let mut ops = Vec::new();

    if let Some(bank) = user.filter(|b| b.has_gain()) {
        ops.push(ColorOperation::Gain {
            r: bank.gain[0],
            g: bank.gain[1],
            b: bank.gain[2],
        });
    }

    let detail = detail_amount(input);
    ops.push(if detail > 0.0 {
        ColorOperation::SharpenHighpass {
            amount: detail,
            sigma: params.radius,
            blend: 1.0,
        }
    } else if detail < 0.0 {
        ColorOperation::Blur { sigma: -detail }
    } else {
        ColorOperation::Blur {
            sigma: NOOP_BLUR_SIGMA,
        }
    });

    if params.black != 0.0 {
        ops.push(ColorOperation::Offset {
            amount: black_offset(input),
        });
    }

    if params.white != 0.0 {
        ops.push(ColorOperation::ToneCurve {
            kind: CurveKind::Highlights,
            table: tone::white_table(params.white),
        });
    }

    if let Some((mix, sigma)) = denoise(input) {
        ops.push(ColorOperation::DenoiseBlend { mix, sigma });
    } else {
        let alpha = grain_alpha(input);
        if alpha > 0.0 {
            ops.push(ColorOperation::GrainSynthesis {
                alpha,
                seed: GRAIN_SEED,
            });
        }
    }

    match hdr(input) {
        Some(Hdr::Boost(boost)) => {
            ops.push(ColorOperation::SharpenHighpass {
                amount: boost.clarity,
                sigma: CLARITY_SIGMA,
                blend: boost.blend,
            });
            ops.push(ColorOperation::ToneCurve {
                kind: CurveKind::HdrS,
                table: tone::s_curve_table(boost.strength),
            });
            ops.push(ColorOperation::Matrix {
                stage: MatrixStage::HdrGain,
                matrix: boost.gain_matrix(),
            });
            ops.push(ColorOperation::Matrix {
                stage: MatrixStage::HdrSaturation,
                matrix: ColorMatrix::saturation(boost.saturation),
            });
        }
        Some(Hdr::Soften(soften)) => {
            ops.push(ColorOperation::DenoiseBlend {
                mix: soften.mix,
                sigma: soften.sigma,
            });
            ops.push(ColorOperation::Matrix {
                stage: MatrixStage::HdrSaturation,
                matrix: ColorMatrix::saturation(soften.saturation),
            });
        }
        None => {}
    }

    if input.color_vision_filter != ColorVisionFilter::None {
        ops.push(ColorOperation::Matrix {
            stage: MatrixStage::ColorVision,
            matrix: ColorMatrix::color_vision(input.color_vision_filter, 1.0),
        });
    }

    if let Some(matrix) = presets::profile_matrix(input.profile, params) {
        ops.push(ColorOperation::Matrix {
            stage: MatrixStage::Profile,
            matrix,
        });
    }
    if let Some(bank) = user {
        if bank.has_curve() {
            ops.push(ColorOperation::ToneCurve {
                kind: CurveKind::User,
                table: tone::user_curve_table(bank.gamma, bank.shadows, bank.highlights),
            });
        }
        if bank.vibrance != 0.0 {
            ops.push(ColorOperation::Vibrance {
                amount: bank.vibrance,
            });
        }
    }

    if let Some(matrix) = presets::style_matrix(&input.toggles) {
        ops.push(ColorOperation::Matrix {
            stage: MatrixStage::Style,
            matrix,
        });
    }
    if input.toggles.vibrant {
        ops.push(ColorOperation::Vibrance {
            amount: STYLE_VIBRANCE,
        });
    }

    if let Some(matrix) = input.active_auto_matrix() {
        ops.push(ColorOperation::Matrix {
            stage: MatrixStage::Auto,
            matrix,
        });
    }

    ops
}
