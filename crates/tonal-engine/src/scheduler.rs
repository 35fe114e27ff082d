//! Adaptive sampling scheduler.
//!
//! Maps recent cut activity to a sampling rate, floors the rate during a
//! post-cut boost window, and backs off geometrically while frame reads are
//! blocked. [`AdaptiveScheduler::next_delay`] is pure so the host owns the
//! timer.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Scheduler tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub min_fps: f64,
    pub max_fps: f64,
    pub initial_fps: f64,
    /// Rolling activity history length
    pub history_size: usize,
    /// Maximum rate change per tick
    pub max_step_fps: f64,
    pub boost_floor_fps: f64,
    pub early_boost_floor_fps: f64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_fps: 2.0,
            max_fps: 10.0,
            initial_fps: 4.0,
            history_size: 5,
            max_step_fps: 1.0,
            boost_floor_fps: 8.0,
            early_boost_floor_fps: 10.0,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
        }
    }
}

/// Where the analysis loop sits when asking for its next delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePhase {
    Normal,
    /// Inside a boost window; `early` is the first sub-window.
    Boost { early: bool },
    /// Reads blocked after `failures` consecutive failures.
    Blocked { failures: u32 },
}

/// Current sampling rate and recent activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveFpsState {
    pub current_fps: f64,
    pub history: VecDeque<f64>,
}

impl AdaptiveFpsState {
    pub fn new(initial_fps: f64) -> Self {
        Self {
            current_fps: initial_fps,
            history: VecDeque::new(),
        }
    }

    pub fn average_activity(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }
}

/// Piecewise-linear activity to rate mapping.
///
/// Low activity ramps 2→4 fps, medium 4→7 fps, high 7→10 fps.
pub fn target_fps(activity: f64) -> f64 {
    const LOW: f64 = 0.02;
    const MEDIUM: f64 = 0.08;
    const HIGH: f64 = 0.20;

    let a = activity.max(0.0);
    if a <= LOW {
        2.0 + (a / LOW) * 2.0
    } else if a <= MEDIUM {
        4.0 + (a - LOW) / (MEDIUM - LOW) * 3.0
    } else if a <= HIGH {
        7.0 + (a - MEDIUM) / (HIGH - MEDIUM) * 3.0
    } else {
        10.0
    }
}

#[derive(Debug, Clone)]
pub struct AdaptiveScheduler {
    config: SchedulerConfig,
    state: AdaptiveFpsState,
    failures: u32,
}

impl Default for AdaptiveScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl AdaptiveScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let state = AdaptiveFpsState::new(config.initial_fps.clamp(config.min_fps, config.max_fps));
        Self {
            config,
            state,
            failures: 0,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> &AdaptiveFpsState {
        &self.state
    }

    pub fn current_fps(&self) -> f64 {
        self.state.current_fps
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Fold an activity score into the history and step the rate toward its target.
    pub fn record_activity(&mut self, score: f64) -> f64 {
        let score = if score.is_finite() { score.max(0.0) } else { 0.0 };
        self.state.history.push_back(score);
        while self.state.history.len() > self.config.history_size.max(1) {
            self.state.history.pop_front();
        }

        let target = target_fps(self.state.average_activity())
            .clamp(self.config.min_fps, self.config.max_fps);
        let step = (target - self.state.current_fps)
            .clamp(-self.config.max_step_fps, self.config.max_step_fps);
        self.state.current_fps =
            (self.state.current_fps + step).clamp(self.config.min_fps, self.config.max_fps);
        self.failures = 0;
        self.state.current_fps
    }

    /// Rate actually used for the next tick.
    pub fn effective_fps(&self, phase: SchedulePhase) -> f64 {
        match phase {
            SchedulePhase::Normal => self.state.current_fps,
            SchedulePhase::Boost { early } => {
                let floor = if early {
                    self.config.early_boost_floor_fps
                } else {
                    self.config.boost_floor_fps
                };
                self.state.current_fps.max(floor)
            }
            SchedulePhase::Blocked { .. } => self.config.min_fps,
        }
    }

    /// Delay before the next tick.
    pub fn next_delay(&self, phase: SchedulePhase) -> Duration {
        match phase {
            SchedulePhase::Blocked { failures } => self.backoff_delay(failures),
            _ => fps_to_delay(self.effective_fps(phase)),
        }
    }

    /// Polling delay while idle.
    pub fn idle_delay(&self) -> Duration {
        fps_to_delay(self.config.min_fps)
    }

    /// `base · 2^(failures − 1)`, capped.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(16);
        let ms = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.config.backoff_max_ms);
        Duration::from_millis(ms)
    }

    /// Register a blocked read; forces the minimum rate and returns the backoff.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.force_min();
        self.backoff_delay(self.failures)
    }

    pub fn force_min(&mut self) {
        self.state.current_fps = self.config.min_fps;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

fn fps_to_delay(fps: f64) -> Duration {
    let fps = if fps.is_finite() && fps > 0.0 { fps } else { 1.0 };
    Duration::from_millis((1000.0 / fps).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_ramps() {
        assert_eq!(target_fps(0.0), 2.0);
        assert!((target_fps(0.02) - 4.0).abs() < 1e-12);
        assert!((target_fps(0.08) - 7.0).abs() < 1e-12);
        assert!((target_fps(0.20) - 10.0).abs() < 1e-12);
        assert_eq!(target_fps(3.0), 10.0);
    }

    #[test]
    fn test_converges_low() {
        let mut s = AdaptiveScheduler::default();
        let mut prev = s.current_fps();
        for _ in 0..10 {
            let fps = s.record_activity(0.0);
            assert!((fps - prev).abs() <= 1.0 + 1e-12);
            prev = fps;
        }
        assert_eq!(s.current_fps(), 2.0);
    }

    #[test]
    fn test_converges_high() {
        let mut s = AdaptiveScheduler::default();
        let mut prev = s.current_fps();
        for _ in 0..10 {
            let fps = s.record_activity(1.0);
            assert!((fps - prev).abs() <= 1.0 + 1e-12);
            prev = fps;
        }
        assert_eq!(s.current_fps(), 10.0);
    }

    #[test]
    fn test_boost_floor_only_affects_delay() {
        let s = AdaptiveScheduler::default();
        assert_eq!(s.effective_fps(SchedulePhase::Boost { early: true }), 10.0);
        assert_eq!(s.effective_fps(SchedulePhase::Boost { early: false }), 8.0);
        assert_eq!(s.current_fps(), 4.0);
        assert_eq!(s.next_delay(SchedulePhase::Normal), Duration::from_millis(250));
        assert_eq!(
            s.next_delay(SchedulePhase::Boost { early: true }),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut s = AdaptiveScheduler::default();
        assert_eq!(s.record_failure(), Duration::from_millis(500));
        assert_eq!(s.current_fps(), 2.0);
        assert_eq!(s.record_failure(), Duration::from_millis(1_000));
        assert_eq!(s.record_failure(), Duration::from_millis(2_000));
        for _ in 0..10 {
            s.record_failure();
        }
        assert_eq!(
            s.next_delay(SchedulePhase::Blocked { failures: s.failures() }),
            Duration::from_millis(8_000)
        );
        s.record_activity(0.0);
        assert_eq!(s.failures(), 0);
    }
}
