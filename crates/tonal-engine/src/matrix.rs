//! 4×5 affine color matrices.
//!
//! Rows are output channels (R, G, B, A); columns are input channels
//! (R, G, B, A) followed by a constant offset. The alpha row is always
//! `[0, 0, 0, 1, 0]`.
//!
//! `multiply(a, b)` treats both operands as 5×5 affine transforms with an
//! implicit `[0, 0, 0, 0, 1]` row, so the result applies `b` first and `a`
//! second. Composition is associative but not commutative.

use serde::{Deserialize, Serialize};
use tonal_models::ColorVisionFilter;

/// Rec. 709 luma weights.
pub const LUMA_R: f64 = 0.2126;
pub const LUMA_G: f64 = 0.7152;
pub const LUMA_B: f64 = 0.0722;

/// Perceptual luma of a linear-ish RGB triple.
#[inline]
pub fn luma(r: f64, g: f64, b: f64) -> f64 {
    LUMA_R * r + LUMA_G * g + LUMA_B * b
}

const ROWS: usize = 4;
const COLS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorMatrix([f64; 20]);

impl Default for ColorMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ColorMatrix {
    pub const IDENTITY: ColorMatrix = ColorMatrix([
        1.0, 0.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0, 0.0,
    ]);

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Build from the three color rows; alpha passes through.
    pub fn from_rows(rows: [[f64; 5]; 3]) -> Self {
        let mut m = Self::IDENTITY.0;
        for (r, row) in rows.iter().enumerate() {
            m[r * COLS..(r + 1) * COLS].copy_from_slice(row);
        }
        Self(m)
    }

    /// Build from a 3×3 linear part with zero offsets.
    pub fn from_linear(m: [[f64; 3]; 3]) -> Self {
        Self::from_rows([
            [m[0][0], m[0][1], m[0][2], 0.0, 0.0],
            [m[1][0], m[1][1], m[1][2], 0.0, 0.0],
            [m[2][0], m[2][1], m[2][2], 0.0, 0.0],
        ])
    }

    pub fn values(&self) -> &[f64; 20] {
        &self.0
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.0[row * COLS + col]
    }

    /// `self · other`: apply `other`, then `self`.
    pub fn multiply(&self, other: &ColorMatrix) -> ColorMatrix {
        let mut out = Self::IDENTITY.0;
        for r in 0..3 {
            for c in 0..COLS {
                let mut acc = 0.0;
                for k in 0..ROWS {
                    acc += self.get(r, k) * other.get(k, c);
                }
                if c == COLS - 1 {
                    acc += self.get(r, COLS - 1);
                }
                out[r * COLS + c] = acc;
            }
        }
        ColorMatrix(out)
    }

    /// Apply `self`, then `next`.
    pub fn then(&self, next: &ColorMatrix) -> ColorMatrix {
        next.multiply(self)
    }

    /// `out = (in · brightness − 0.5) · contrast + 0.5`
    pub fn brightness_contrast(brightness: f64, contrast: f64) -> Self {
        let scale = brightness * contrast;
        let offset = 0.5 * (1.0 - contrast);
        Self::from_rows([
            [scale, 0.0, 0.0, 0.0, offset],
            [0.0, scale, 0.0, 0.0, offset],
            [0.0, 0.0, scale, 0.0, offset],
        ])
    }

    /// Luma-preserving saturation; `1.0` is identity, `0.0` is grayscale.
    pub fn saturation(amount: f64) -> Self {
        let inv = 1.0 - amount;
        let (r, g, b) = (LUMA_R * inv, LUMA_G * inv, LUMA_B * inv);
        Self::from_linear([
            [r + amount, g, b],
            [r, g + amount, b],
            [r, g, b + amount],
        ])
    }

    /// Luma-preserving hue rotation.
    ///
    /// `M = I + (cos θ − 1)(I − L) + sin θ · K` where every row of `L` is the
    /// luma weight vector and `K` is the chroma-plane generator derived from
    /// the same weights, so `w·K = 0` and `K·1 = 0`.
    pub fn hue_rotate(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::hue_rotate_sin_cos(sin, cos)
    }

    /// Hue rotation from a precomputed sine and cosine.
    pub fn hue_rotate_sin_cos(sin: f64, cos: f64) -> Self {
        let c1 = cos - 1.0;
        let w = [LUMA_R, LUMA_G, LUMA_B];
        let k = hue_generator();
        let mut lin = [[0.0; 3]; 3];
        for (r, row) in lin.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                let ident = if r == c { 1.0 } else { 0.0 };
                *cell = ident + c1 * (ident - w[c]) + sin * k[r][c];
            }
        }
        Self::from_linear(lin)
    }

    /// Per-channel gain.
    pub fn channel_gain(r: f64, g: f64, b: f64) -> Self {
        Self::from_linear([[r, 0.0, 0.0], [0.0, g, 0.0], [0.0, 0.0, b]])
    }

    /// Uniform offset added to every color channel.
    pub fn offset(amount: f64) -> Self {
        Self::from_rows([
            [1.0, 0.0, 0.0, 0.0, amount],
            [0.0, 1.0, 0.0, 0.0, amount],
            [0.0, 0.0, 1.0, 0.0, amount],
        ])
    }

    /// Color-vision-deficiency simulation interpolated from identity by `strength`.
    pub fn color_vision(kind: ColorVisionFilter, strength: f64) -> Self {
        let full = match kind {
            ColorVisionFilter::None => return Self::IDENTITY,
            ColorVisionFilter::Protanopia => Self::from_linear([
                [0.567, 0.433, 0.0],
                [0.558, 0.442, 0.0],
                [0.0, 0.242, 0.758],
            ]),
            ColorVisionFilter::Deuteranopia => Self::from_linear([
                [0.625, 0.375, 0.0],
                [0.7, 0.3, 0.0],
                [0.0, 0.3, 0.7],
            ]),
            ColorVisionFilter::Tritanomaly => Self::from_linear([
                [0.967, 0.033, 0.0],
                [0.0, 0.733, 0.267],
                [0.0, 0.183, 0.817],
            ]),
        };
        Self::IDENTITY.lerp(&full, strength.clamp(0.0, 1.0))
    }

    /// Coefficient-wise linear interpolation.
    pub fn lerp(&self, other: &ColorMatrix, t: f64) -> ColorMatrix {
        let mut out = self.0;
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a + (b - a) * t;
        }
        ColorMatrix(out)
    }

    /// Transform an RGB triple with alpha fixed at 1.
    #[inline]
    pub fn apply(&self, rgb: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        let row = |r: usize| {
            let o = r * COLS;
            m[o] * rgb[0] + m[o + 1] * rgb[1] + m[o + 2] * rgb[2] + m[o + 3] + m[o + 4]
        };
        [row(0), row(1), row(2)]
    }

    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.0
            .iter()
            .zip(Self::IDENTITY.0.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Fixed-precision string used to detect changed matrices.
    pub fn cache_key(&self) -> String {
        self.0
            .iter()
            .map(|v| format!("{:.5}", v + 0.0))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_f32(&self) -> [f32; 20] {
        let mut out = [0.0f32; 20];
        for (o, v) in out.iter_mut().zip(self.0.iter()) {
            *o = *v as f32;
        }
        out
    }

    pub fn from_f32(values: &[f32; 20]) -> Self {
        let mut out = [0.0f64; 20];
        for (o, v) in out.iter_mut().zip(values.iter()) {
            *o = f64::from(*v);
        }
        Self(out)
    }
}

/// `multiply(a, b)`: apply `b`, then `a`.
pub fn multiply(a: &ColorMatrix, b: &ColorMatrix) -> ColorMatrix {
    a.multiply(b)
}

fn hue_generator() -> [[f64; 3]; 3] {
    let (wr, wg, wb) = (LUMA_R, LUMA_G, LUMA_B);
    [
        [-wr, -wg, 1.0 - wb],
        [
            (wr * wr + wb * (1.0 - wr)) / wg,
            wr - wb,
            -(wr * (1.0 - wb) + wb * wb) / wg,
        ],
        [-(1.0 - wr), wg, wb],
    ]
}
