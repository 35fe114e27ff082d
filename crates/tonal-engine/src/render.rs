//! CPU reference evaluators for both pipeline forms.
//!
//! [`apply_graph`] walks the filter graph node by node with full intermediate
//! buffers. [`apply_shader`] mirrors the single-pass fragment shader, where a
//! spatial stage re-evaluates every earlier stage at each of its taps; here
//! that is computed plane by plane, which gives the same values.

use std::collections::HashMap;

use crate::compiler::graph::{FilterGraph, Primitive, TransferFunction, SOURCE};
use crate::compiler::ops::CLARITY_SIGMA;
use crate::compiler::shader::ShaderUniforms;
use crate::compiler::tone;
use crate::frame::PixelBuffer;
use crate::matrix::{luma, ColorMatrix};

/// Kernels narrower than this are the identity.
pub const MIN_BLUR_SIGMA: f64 = 0.3;
pub const MAX_BLUR_RADIUS: usize = 8;

type Rgb = [f64; 3];

/// Float RGB plane on a [0, 1] scale.
#[derive(Debug, Clone)]
struct Plane {
    width: usize,
    height: usize,
    data: Vec<Rgb>,
}

impl Plane {
    fn from_buffer(buffer: &PixelBuffer) -> Self {
        let data = buffer
            .pixels()
            .map(|px| {
                [
                    f64::from(px[0]) / 255.0,
                    f64::from(px[1]) / 255.0,
                    f64::from(px[2]) / 255.0,
                ]
            })
            .collect();
        Self {
            width: buffer.width() as usize,
            height: buffer.height() as usize,
            data,
        }
    }

    fn to_buffer(&self, source: &PixelBuffer) -> PixelBuffer {
        let mut i = 0usize;
        PixelBuffer::from_fn(source.width(), source.height(), |x, y| {
            let c = self.data[i];
            i += 1;
            let alpha = source.pixel(x, y)[3];
            [to_u8(c[0]), to_u8(c[1]), to_u8(c[2]), alpha]
        })
    }

    fn map(&self, f: impl Fn(Rgb) -> Rgb) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|c| f(*c)).collect(),
        }
    }

    fn map_indexed(&self, f: impl Fn(usize, usize, Rgb) -> Rgb) -> Self {
        let width = self.width.max(1);
        Self {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .enumerate()
                .map(|(i, c)| f(i % width, i / width, *c))
                .collect(),
        }
    }

    fn zip(&self, other: &Plane, f: impl Fn(Rgb, Rgb) -> Rgb) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| f(*a, *b))
                .collect(),
        }
    }

    /// Separable Gaussian blur with clamp-to-edge sampling.
    fn gaussian_blur(&self, sigma: f64) -> Self {
        let kernel = gaussian_kernel(sigma);
        if kernel.len() <= 1 || self.data.is_empty() {
            return self.clone();
        }
        let radius = (kernel.len() / 2) as isize;
        let (w, h) = (self.width as isize, self.height as isize);

        let mut horizontal = vec![[0.0; 3]; self.data.len()];
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0; 3];
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = (x + k as isize - radius).clamp(0, w - 1);
                    let c = self.data[(y * w + sx) as usize];
                    for ch in 0..3 {
                        acc[ch] += c[ch] * weight;
                    }
                }
                horizontal[(y * w + x) as usize] = acc;
            }
        }

        let mut out = vec![[0.0; 3]; self.data.len()];
        for y in 0..h {
            for x in 0..w {
                let mut acc = [0.0; 3];
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = (y + k as isize - radius).clamp(0, h - 1);
                    let c = horizontal[(sy * w + x) as usize];
                    for ch in 0..3 {
                        acc[ch] += c[ch] * weight;
                    }
                }
                out[(y * w + x) as usize] = acc;
            }
        }

        Self {
            width: self.width,
            height: self.height,
            data: out,
        }
    }
}

/// Normalized 1-D kernel; a single tap below [`MIN_BLUR_SIGMA`].
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if !sigma.is_finite() || sigma < MIN_BLUR_SIGMA {
        return vec![1.0];
    }
    let radius = ((3.0 * sigma).ceil() as usize).min(MAX_BLUR_RADIUS) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Deterministic per-pixel noise in [0, 1].
pub fn grain_noise(x: u32, y: u32, seed: u32) -> f64 {
    let mut h = x.wrapping_mul(0x8da6_b343) ^ y.wrapping_mul(0xd816_3841) ^ seed.wrapping_mul(0xcb1a_b31f);
    h ^= h >> 13;
    h = h.wrapping_mul(0x5bd1_e995);
    h ^= h >> 15;
    f64::from(h) / f64::from(u32::MAX)
}

/// Push chroma away from luma, weighted toward low-saturation pixels.
pub fn vibrance(c: Rgb, amount: f64) -> Rgb {
    let y = luma(c[0], c[1], c[2]);
    let spread = c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2]);
    let k = 1.0 + amount * (1.0 - spread);
    clamp3([y + (c[0] - y) * k, y + (c[1] - y) * k, y + (c[2] - y) * k])
}

/// Evaluate a filter graph on `buffer`.
pub fn apply_graph(graph: &FilterGraph, buffer: &PixelBuffer) -> PixelBuffer {
    let source = Plane::from_buffer(buffer);
    let mut planes: HashMap<&str, Plane> = HashMap::new();
    planes.insert(SOURCE, source.clone());
    let mut last = source;

    for node in &graph.nodes {
        let input = |i: usize| -> Option<&Plane> {
            node.inputs.get(i).and_then(|label| planes.get(label.as_str()))
        };
        let Some(a) = input(0) else {
            continue;
        };

        let out = match &node.primitive {
            Primitive::ComponentTransfer { function } => match function {
                TransferFunction::Linear { slope, intercept } => a.map(|c| {
                    clamp3([
                        c[0] * slope[0] + intercept[0],
                        c[1] * slope[1] + intercept[1],
                        c[2] * slope[2] + intercept[2],
                    ])
                }),
                TransferFunction::Table { values } => a.map(|c| {
                    [
                        tone::sample_table(values, c[0]),
                        tone::sample_table(values, c[1]),
                        tone::sample_table(values, c[2]),
                    ]
                }),
                TransferFunction::Gamma {
                    amplitude,
                    exponent,
                    offset,
                } => a.map(|c| {
                    let f = |v: f64| amplitude * v.powf(*exponent) + offset;
                    clamp3([f(c[0]), f(c[1]), f(c[2])])
                }),
            },
            Primitive::ColorMatrix { values } => {
                let matrix = matrix_from_values(values);
                a.map(|c| clamp3(matrix.apply(c)))
            }
            Primitive::GaussianBlur { sigma } => a.gaussian_blur(*sigma),
            Primitive::Arithmetic { k1, k2, k3, k4 } => {
                let Some(b) = input(1) else {
                    continue;
                };
                a.zip(b, |p, q| {
                    let f = |i: usize| k1 * p[i] * q[i] + k2 * p[i] + k3 * q[i] + k4;
                    clamp3([f(0), f(1), f(2)])
                })
            }
            Primitive::Grain { alpha, seed } => a.map_indexed(|x, y, c| {
                let n = grain_noise(x as u32, y as u32, *seed) - 0.5;
                clamp3([c[0] + alpha * n, c[1] + alpha * n, c[2] + alpha * n])
            }),
            Primitive::Vibrance { amount } => a.map(|c| vibrance(c, *amount)),
            Primitive::Merge => a.clone(),
        };

        last = out.clone();
        planes.insert(node.result.as_str(), out);
    }

    last.to_buffer(buffer)
}

/// Evaluate the fragment shader's math for every pixel of `buffer`.
pub fn apply_shader(u: &ShaderUniforms, buffer: &PixelBuffer) -> PixelBuffer {
    if u.is_bypass() {
        return buffer.clone();
    }

    let f = |v: f32| f64::from(v);
    let gain = [f(u.channel_gain[0]), f(u.channel_gain[1]), f(u.channel_gain[2])];
    let black = f(u.black_offset);
    let highlights = f(u.highlights);
    let hdr = f(u.hdr_strength);

    let pre = |c: Rgb| clamp3([c[0] * gain[0], c[1] * gain[1], c[2] * gain[2]]);
    let toned = |c: Rgb| {
        let c = clamp3([c[0] + black, c[1] + black, c[2] + black]);
        if highlights != 0.0 {
            [
                tone::white_value(c[0], highlights),
                tone::white_value(c[1], highlights),
                tone::white_value(c[2], highlights),
            ]
        } else {
            c
        }
    };

    let source = Plane::from_buffer(buffer);
    let gained = source.map(pre);
    let sharpen = f(u.sharpen_amount);

    // Each spatial stage samples the per-texel result of every stage before it.
    let detail_blur = gained.gaussian_blur(f(u.detail_sigma));
    let detailed = gained.zip(&detail_blur, |c, b| {
        let c = if sharpen > 0.0 {
            clamp3([
                c[0] + sharpen * (c[0] - b[0]),
                c[1] + sharpen * (c[1] - b[1]),
                c[2] + sharpen * (c[2] - b[2]),
            ])
        } else {
            b
        };
        toned(c)
    });

    let textured = if u.denoise_mix > 0.0 {
        let blurred = detailed.gaussian_blur(f(u.denoise_sigma));
        let mix = f(u.denoise_mix);
        detailed.zip(&blurred, |c, b| clamp3(lerp3(c, b, mix)))
    } else if u.grain_amount > 0.0 {
        let amount = f(u.grain_amount);
        detailed.map_indexed(|x, y, c| {
            let a = amount * (grain_noise(x as u32, y as u32, u.grain_seed) - 0.5);
            clamp3([c[0] + a, c[1] + a, c[2] + a])
        })
    } else {
        detailed
    };

    let hdr_local = if hdr > 0.0 {
        Some(textured.gaussian_blur(CLARITY_SIGMA))
    } else if hdr < 0.0 {
        Some(textured.gaussian_blur(0.9 + 1.8 * -hdr))
    } else {
        None
    };

    let cvf = ColorMatrix::from_f32(&u.cvf_matrix);
    let profile = ColorMatrix::from_f32(&u.profile_matrix);
    let style = ColorMatrix::from_f32(&u.style_matrix);
    let auto = ColorMatrix::from_f32(&u.auto_matrix);
    let user = (u.user_enabled > 0.5).then(|| user_matrix(u));

    let out = textured.map_indexed(|x, y, mut c| {
        let i = y * textured.width + x;

        if let Some(local) = &hdr_local {
            let l = local.data[i];
            if hdr > 0.0 {
                let s = hdr;
                let amount = 0.55 + 0.55 * s;
                let clarity = clamp3([
                    c[0] + amount * (c[0] - l[0]),
                    c[1] + amount * (c[1] - l[1]),
                    c[2] + amount * (c[2] - l[2]),
                ]);
                c = clamp3(lerp3(c, clarity, (0.65 + 0.12 * s).min(0.89)));
                c = [
                    tone::s_curve_value(c[0], s),
                    tone::s_curve_value(c[1], s),
                    tone::s_curve_value(c[2], s),
                ];
                let (k, b) = (1.10 + 0.18 * s, -0.015 + 0.006 * s);
                c = clamp3([c[0] * k + b, c[1] * k + b, c[2] * k + b]);
                c = clamp3(ColorMatrix::saturation(1.10 + 0.30 * s).apply(c));
            } else {
                let s = -hdr;
                c = clamp3(lerp3(c, l, 0.55 * s));
                c = clamp3(ColorMatrix::saturation(1.0 - 0.18 * s).apply(c));
            }
        }

        c = clamp3(cvf.apply(c));
        c = match &user {
            Some(m) => {
                let mut v = clamp3(m.apply(c));
                let (g, sh, hl) = (f(u.gamma), f(u.shadows), f(u.user_highlights));
                v = [
                    tone::user_curve_value(v[0], g, sh, hl),
                    tone::user_curve_value(v[1], g, sh, hl),
                    tone::user_curve_value(v[2], g, sh, hl),
                ];
                if u.vibrance != 0.0 {
                    v = vibrance(v, f(u.vibrance));
                }
                v
            }
            None => clamp3(profile.apply(c)),
        };
        c = clamp3(style.apply(c));
        if u.style_vibrance > 0.0 {
            c = vibrance(c, f(u.style_vibrance));
        }
        clamp3(auto.apply(c))
    });

    out.to_buffer(buffer)
}

/// Mean absolute channel error between two equally sized buffers, on [0, 1].
pub fn mean_abs_error(a: &PixelBuffer, b: &PixelBuffer) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for (p, q) in a.pixels().zip(b.pixels()) {
        for ch in 0..3 {
            total += (f64::from(p[ch]) - f64::from(q[ch])).abs() / 255.0;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

fn user_matrix(u: &ShaderUniforms) -> ColorMatrix {
    let f = |v: f32| f64::from(v);
    let (scale, offset) = (f(u.brightness), f(u.brightness_offset));
    let levels = ColorMatrix::from_rows([
        [scale, 0.0, 0.0, 0.0, offset],
        [0.0, scale, 0.0, 0.0, offset],
        [0.0, 0.0, scale, 0.0, offset],
    ]);
    ColorMatrix::hue_rotate_sin_cos(f(u.hue_sin), f(u.hue_cos))
        .multiply(&ColorMatrix::saturation(f(u.saturation)))
        .multiply(&ColorMatrix::brightness_contrast(1.0, f(u.contrast)))
        .multiply(&levels)
}

fn matrix_from_values(values: &[f64]) -> ColorMatrix {
    if values.len() < 15 {
        return ColorMatrix::IDENTITY;
    }
    let row = |r: usize| -> [f64; 5] {
        let o = r * 5;
        [values[o], values[o + 1], values[o + 2], values[o + 3], values[o + 4]]
    };
    ColorMatrix::from_rows([row(0), row(1), row(2)])
}

#[inline]
fn clamp3(c: Rgb) -> Rgb {
    [c[0].clamp(0.0, 1.0), c[1].clamp(0.0, 1.0), c[2].clamp(0.0, 1.0)]
}

#[inline]
fn lerp3(a: Rgb, b: Rgb, t: f64) -> Rgb {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

#[inline]
fn to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, CompileInput};
    use tonal_models::{ParameterSet, Profile};

    fn gradient() -> PixelBuffer {
        PixelBuffer::from_fn(24, 12, |x, y| [(x * 10) as u8, (y * 20) as u8, 128, 255])
    }

    #[test]
    fn test_kernel_normalized() {
        let k = gaussian_kernel(1.0);
        assert_eq!(k.len(), 7);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(gaussian_kernel(0.01), vec![1.0]);
        assert_eq!(gaussian_kernel(5.0).len(), 2 * MAX_BLUR_RADIUS + 1);
    }

    #[test]
    fn test_grain_noise_deterministic() {
        assert_eq!(grain_noise(3, 4, 7), grain_noise(3, 4, 7));
        assert_ne!(grain_noise(3, 4, 7), grain_noise(4, 3, 7));
        let n = grain_noise(100, 200, 7);
        assert!((0.0..=1.0).contains(&n));
    }

    #[test]
    fn test_bypass_is_exact_in_both_backends() {
        let buf = gradient();
        let pipeline = compile(&CompileInput::default());
        assert_eq!(apply_graph(&pipeline.graph, &buf), buf);
        assert_eq!(apply_shader(&pipeline.uniforms, &buf), buf);
    }

    #[test]
    fn test_noop_detail_blur_keeps_pixels() {
        // Profile with an identity-free matrix still passes the detail stage untouched.
        let mut params = ParameterSet::default();
        params.black = 0.1;
        let buf = PixelBuffer::filled(8, 8, [100, 100, 100, 255]);
        let pipeline = compile(&CompileInput {
            params,
            ..CompileInput::default()
        });
        let out = apply_graph(&pipeline.graph, &buf);
        // 100/255 + 0.004
        assert_eq!(out.pixel(3, 3)[0], 101);
    }

    #[test]
    fn test_detail_only_backends_agree_on_gradient() {
        let mut params = ParameterSet::default();
        params.sharpen = 1.5;
        params.radius = 1.2;
        let input = CompileInput {
            params,
            profile: Profile::Off,
            ..CompileInput::default()
        };
        let pipeline = compile(&input);
        let buf = gradient();
        let a = apply_graph(&pipeline.graph, &buf);
        let b = apply_shader(&pipeline.uniforms, &buf);
        assert!(mean_abs_error(&a, &b) < 0.005);
    }

    #[test]
    fn test_alpha_preserved() {
        let buf = PixelBuffer::filled(4, 4, [50, 60, 70, 90]);
        let pipeline = compile(&CompileInput {
            profile: Profile::Gaming,
            ..CompileInput::default()
        });
        assert_eq!(apply_graph(&pipeline.graph, &buf).pixel(1, 1)[3], 90);
        assert_eq!(apply_shader(&pipeline.uniforms, &buf).pixel(1, 1)[3], 90);
    }
}
