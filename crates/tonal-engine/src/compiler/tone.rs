//! Tone curves shared by the operation list, the filter graph and the shader.
//!
//! Each curve has an analytic form (used by the shader) and a sampled table
//! (used by the filter graph's component-transfer nodes).

/// Highlights rolloff knee.
pub const WHITE_KNEE: f64 = 0.78;
pub const WHITE_TABLE_SIZE: usize = 17;
pub const CURVE_TABLE_SIZE: usize = 33;

const S_CURVE_POWER: f64 = 1.35;

/// Identity below the knee, linear extrapolation above it.
pub fn white_value(t: f64, white: f64) -> f64 {
    if t <= WHITE_KNEE {
        return t.clamp(0.0, 1.0);
    }
    let slope = 1.0 + 0.25 * white;
    (WHITE_KNEE + (t - WHITE_KNEE) * slope).clamp(0.0, 1.0)
}

pub fn white_table(white: f64) -> Vec<f64> {
    sample(WHITE_TABLE_SIZE, |t| white_value(t, white))
}

/// Toe and shoulder for HDR strength `s`.
pub fn s_curve_points(s: f64) -> (f64, f64) {
    (0.20 + 0.06 * s, 0.78 - 0.05 * s)
}

/// Power-law toe and shoulder around a linear mid section.
pub fn s_curve_value(t: f64, s: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    let (toe, shoulder) = s_curve_points(s);
    if t < toe {
        toe * (t / toe).powf(S_CURVE_POWER)
    } else if t > shoulder {
        1.0 - (1.0 - shoulder) * ((1.0 - t) / (1.0 - shoulder)).powf(S_CURVE_POWER)
    } else {
        t
    }
}

pub fn s_curve_table(s: f64) -> Vec<f64> {
    sample(CURVE_TABLE_SIZE, |t| s_curve_value(t, s))
}

/// User gamma, then shadow and highlight lifts.
///
/// `gamma` is a factor (1.0 neutral); `shadows` and `highlights` are in [-1, 1].
pub fn user_curve_value(t: f64, gamma: f64, shadows: f64, highlights: f64) -> f64 {
    let v = t.clamp(0.0, 1.0).powf(1.0 / gamma.max(0.01));
    let lifted = v
        + 0.15 * shadows * v * (1.0 - v) * (1.0 - v)
        + 0.15 * highlights * v * v * (1.0 - v);
    lifted.clamp(0.0, 1.0)
}

pub fn user_curve_table(gamma: f64, shadows: f64, highlights: f64) -> Vec<f64> {
    sample(CURVE_TABLE_SIZE, |t| user_curve_value(t, gamma, shadows, highlights))
}

/// Piecewise-linear lookup over evenly spaced samples.
pub fn sample_table(table: &[f64], t: f64) -> f64 {
    match table.len() {
        0 => t,
        1 => table[0],
        n => {
            let pos = t.clamp(0.0, 1.0) * (n - 1) as f64;
            let i = (pos.floor() as usize).min(n - 2);
            let frac = pos - i as f64;
            table[i] + (table[i + 1] - table[i]) * frac
        }
    }
}

fn sample(n: usize, f: impl Fn(f64) -> f64) -> Vec<f64> {
    (0..n).map(|i| f(i as f64 / (n - 1) as f64)).collect()
}
