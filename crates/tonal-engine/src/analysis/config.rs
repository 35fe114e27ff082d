//! Configuration for the scene analysis loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::scheduler::SchedulerConfig;

/// Tuning for cut/motion detection, target derivation and smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    // ============================================
    // Analysis Surface
    // ============================================
    /// Width frames are resized to before statistics are taken.
    pub surface_width: u32,

    /// Height frames are resized to before statistics are taken.
    pub surface_height: u32,

    // ============================================
    // Cut and Motion Detection
    // ============================================
    /// A cut is declared when the cut score exceeds this.
    pub cut_threshold: f64,

    /// Smoothing factor of the statistics EMA.
    pub stats_ema_alpha: f64,

    /// Smoothing factor of the motion EMA.
    pub motion_ema_alpha: f64,

    /// Motion EMA level counted as "moving".
    pub motion_threshold: f64,

    /// Consecutive moving ticks required before targets may update.
    pub motion_ticks: u32,

    // ============================================
    // Smoothing
    // ============================================
    /// Approach factor while a boost window is active.
    pub boost_step: f64,

    /// Approach factor otherwise.
    pub base_step: f64,

    /// Snap distance for brightness, contrast and saturation.
    pub tone_dead_zone: f64,

    /// Snap distance for hue, in degrees.
    pub hue_dead_zone: f64,

    // ============================================
    // Timing (milliseconds)
    // ============================================
    /// Minimum spacing between auto-matrix publications.
    pub emit_throttle_ms: u64,

    /// Boost window after a cut.
    pub boost_window_ms: u64,

    /// Early sub-window with an even higher rate.
    pub early_boost_ms: u64,

    /// Liveness goes stale after this long without an update.
    pub stale_after_ms: u64,

    /// Backwards position jump treated as a restart, in seconds.
    pub restart_jump_secs: f64,

    /// Sources smaller than this are ineligible.
    pub min_source_width: u32,
    pub min_source_height: u32,

    pub scheduler: SchedulerConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            surface_width: 96,
            surface_height: 54,
            cut_threshold: 0.14,
            stats_ema_alpha: 0.12,
            motion_ema_alpha: 0.30,
            motion_threshold: 0.0075,
            motion_ticks: 5,
            boost_step: 0.16,
            base_step: 0.05,
            tone_dead_zone: 0.003,
            hue_dead_zone: 0.06,
            emit_throttle_ms: 150,
            boost_window_ms: 800,
            early_boost_ms: 700,
            stale_after_ms: 10_000,
            restart_jump_secs: 1.0,
            min_source_width: 64,
            min_source_height: 36,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn emit_throttle(&self) -> Duration {
        Duration::from_millis(self.emit_throttle_ms)
    }

    pub fn boost_window(&self) -> Duration {
        Duration::from_millis(self.boost_window_ms)
    }

    pub fn early_boost(&self) -> Duration {
        Duration::from_millis(self.early_boost_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.cut_threshold, 0.14);
        assert_eq!(config.boost_window(), Duration::from_millis(800));
        assert!(config.early_boost() < config.boost_window());
        assert_eq!(config.scheduler.max_fps, 10.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"cut_threshold": 0.2}"#).unwrap();
        assert_eq!(config.cut_threshold, 0.2);
        assert_eq!(config.motion_ticks, 5);
    }
}
