//! Frame statistics over down-sampled analysis surfaces.
//!
//! Statistics are computed in a single pass over every second pixel. Luma
//! uses the Rec. 709 weights from [`crate::matrix`].

use serde::{Deserialize, Serialize};

use crate::frame::PixelBuffer;
use crate::matrix::luma;

/// Pixel stride of the statistics pass.
pub const SAMPLE_STRIDE: usize = 2;

/// Grid of the low-resolution luma field used for motion scoring.
pub const LUMA_FIELD_COLS: u32 = 16;
pub const LUMA_FIELD_ROWS: u32 = 9;

/// Cut-score weights.
const CUT_WEIGHT_LUMA: f64 = 1.0;
const CUT_WEIGHT_CHROMA: f64 = 0.8;
const CUT_WEIGHT_RB: f64 = 0.6;
const CUT_WEIGHT_GB: f64 = 0.6;

/// Compact per-frame statistics, all on a [0, 1] scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub mean_r: f64,
    pub mean_g: f64,
    pub mean_b: f64,
    pub mean_luma: f64,
    pub std_luma: f64,
    /// Mean of `max(r, g, b) - min(r, g, b)`
    pub mean_chroma: f64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl FrameStats {
    /// A record that derives identity targets.
    pub const NEUTRAL: FrameStats = FrameStats {
        mean_r: 0.5,
        mean_g: 0.5,
        mean_b: 0.5,
        mean_luma: 0.5,
        std_luma: 0.23,
        mean_chroma: 0.12,
    };

    /// Compute statistics, or `None` when the buffer holds no sampled pixels.
    pub fn compute(buffer: &PixelBuffer) -> Option<FrameStats> {
        let mut count = 0usize;
        let (mut sr, mut sg, mut sb) = (0.0, 0.0, 0.0);
        let (mut sy, mut syy, mut sc) = (0.0, 0.0, 0.0);

        for px in buffer.pixels().step_by(SAMPLE_STRIDE) {
            let r = f64::from(px[0]) / 255.0;
            let g = f64::from(px[1]) / 255.0;
            let b = f64::from(px[2]) / 255.0;
            let y = luma(r, g, b);
            sr += r;
            sg += g;
            sb += b;
            sy += y;
            syy += y * y;
            sc += r.max(g).max(b) - r.min(g).min(b);
            count += 1;
        }

        if count == 0 {
            return None;
        }

        let n = count as f64;
        let mean_luma = sy / n;
        let variance = (syy / n - mean_luma * mean_luma).max(0.0);
        Some(FrameStats {
            mean_r: sr / n,
            mean_g: sg / n,
            mean_b: sb / n,
            mean_luma,
            std_luma: variance.sqrt(),
            mean_chroma: sc / n,
        })
    }

    /// Compute statistics, falling back to `previous` (or neutral) on empty input.
    pub fn compute_or(buffer: &PixelBuffer, previous: Option<&FrameStats>) -> FrameStats {
        Self::compute(buffer).unwrap_or_else(|| previous.copied().unwrap_or_default())
    }

    /// Exponential smoothing toward `sample` with factor `alpha`.
    pub fn blend(&self, sample: &FrameStats, alpha: f64) -> FrameStats {
        let mix = |a: f64, b: f64| a + (b - a) * alpha;
        FrameStats {
            mean_r: mix(self.mean_r, sample.mean_r),
            mean_g: mix(self.mean_g, sample.mean_g),
            mean_b: mix(self.mean_b, sample.mean_b),
            mean_luma: mix(self.mean_luma, sample.mean_luma),
            std_luma: mix(self.std_luma, sample.std_luma),
            mean_chroma: mix(self.mean_chroma, sample.mean_chroma),
        }
    }

    /// Red/blue chrominance proxy.
    pub fn rb_balance(&self) -> f64 {
        self.mean_r - self.mean_b
    }

    /// Green/blue chrominance proxy.
    pub fn gb_balance(&self) -> f64 {
        self.mean_g - self.mean_b
    }
}

/// Weighted absolute deltas of luma, chroma spread and chrominance proxies.
pub fn cut_score(previous: &FrameStats, current: &FrameStats) -> f64 {
    CUT_WEIGHT_LUMA * (current.mean_luma - previous.mean_luma).abs()
        + CUT_WEIGHT_CHROMA * (current.mean_chroma - previous.mean_chroma).abs()
        + CUT_WEIGHT_RB * (current.rb_balance() - previous.rb_balance()).abs()
        + CUT_WEIGHT_GB * (current.gb_balance() - previous.gb_balance()).abs()
}

/// Block-averaged luma grid.
#[derive(Debug, Clone, PartialEq)]
pub struct LumaField {
    cols: u32,
    rows: u32,
    cells: Vec<f64>,
}

impl LumaField {
    pub fn from_buffer(buffer: &PixelBuffer) -> LumaField {
        let cols = LUMA_FIELD_COLS.min(buffer.width()).max(1);
        let rows = LUMA_FIELD_ROWS.min(buffer.height()).max(1);
        let mut sums = vec![0.0; (cols * rows) as usize];
        let mut counts = vec![0u32; (cols * rows) as usize];

        for y in 0..buffer.height() {
            let cy = (y * rows / buffer.height().max(1)).min(rows - 1);
            for x in 0..buffer.width() {
                let cx = (x * cols / buffer.width().max(1)).min(cols - 1);
                let px = buffer.pixel(x, y);
                let idx = (cy * cols + cx) as usize;
                sums[idx] += luma(
                    f64::from(px[0]) / 255.0,
                    f64::from(px[1]) / 255.0,
                    f64::from(px[2]) / 255.0,
                );
                counts[idx] += 1;
            }
        }

        let cells = sums
            .iter()
            .zip(counts.iter())
            .map(|(s, c)| if *c > 0 { s / f64::from(*c) } else { 0.0 })
            .collect();
        LumaField { cols, rows, cells }
    }

    /// Mean absolute difference; mismatched grids count as full motion.
    pub fn motion_from(&self, previous: &LumaField) -> f64 {
        if self.cols != previous.cols || self.rows != previous.rows || self.cells.is_empty() {
            return 1.0;
        }
        let total: f64 = self
            .cells
            .iter()
            .zip(previous.cells.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        total / self.cells.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(level: u8) -> PixelBuffer {
        PixelBuffer::filled(96, 54, [level, level, level, 255])
    }

    #[test]
    fn test_uniform_gray_stats() {
        let stats = FrameStats::compute(&gray(128)).unwrap();
        let v = 128.0 / 255.0;
        assert!((stats.mean_luma - v).abs() < 1e-9);
        assert!(stats.std_luma < 1e-6);
        assert!(stats.mean_chroma.abs() < 1e-12);
        assert!((stats.mean_r - v).abs() < 1e-12);
    }

    #[test]
    fn test_chroma_and_channel_means() {
        let buf = PixelBuffer::filled(10, 10, [255, 0, 0, 255]);
        let stats = FrameStats::compute(&buf).unwrap();
        assert!((stats.mean_chroma - 1.0).abs() < 1e-12);
        assert!((stats.mean_r - 1.0).abs() < 1e-12);
        assert!((stats.mean_luma - 0.2126).abs() < 1e-9);
    }

    #[test]
    fn test_std_of_checker() {
        // Alternating columns on an odd width so the stride still hits both values.
        let buf = PixelBuffer::from_fn(5, 4, |x, _| if x % 2 == 0 { [0, 0, 0, 255] } else { [255, 255, 255, 255] });
        let stats = FrameStats::compute(&buf).unwrap();
        assert!(stats.std_luma > 0.3);
    }

    #[test]
    fn test_empty_buffer_falls_back() {
        let empty = PixelBuffer::filled(0, 0, [0, 0, 0, 0]);
        assert!(FrameStats::compute(&empty).is_none());
        let prev = FrameStats {
            mean_luma: 0.9,
            ..FrameStats::NEUTRAL
        };
        assert_eq!(FrameStats::compute_or(&empty, Some(&prev)), prev);
        assert_eq!(FrameStats::compute_or(&empty, None), FrameStats::NEUTRAL);
    }

    #[test]
    fn test_cut_score_luma_jump() {
        let a = FrameStats::compute(&gray(64)).unwrap();
        let b = FrameStats::compute(&gray(191)).unwrap();
        let score = cut_score(&a, &b);
        assert!(score > 0.14, "score {score}");
        assert!(cut_score(&a, &a) < 1e-12);
    }

    #[test]
    fn test_blend() {
        let a = FrameStats::NEUTRAL;
        let b = FrameStats {
            mean_luma: 1.0,
            ..FrameStats::NEUTRAL
        };
        let mixed = a.blend(&b, 0.12);
        assert!((mixed.mean_luma - 0.56).abs() < 1e-12);
    }

    #[test]
    fn test_motion_field() {
        let a = LumaField::from_buffer(&gray(100));
        let b = LumaField::from_buffer(&gray(100));
        assert!(a.motion_from(&b) < 1e-12);
        let c = LumaField::from_buffer(&gray(200));
        assert!((c.motion_from(&a) - 100.0 / 255.0).abs() < 1e-9);
        let tiny = LumaField::from_buffer(&PixelBuffer::filled(4, 4, [0, 0, 0, 255]));
        assert_eq!(tiny.motion_from(&a), 1.0);
    }
}
