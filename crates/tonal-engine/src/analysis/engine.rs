//! Scene analysis engine: one tick of sample → statistics → cut/motion →
//! targets → smoothing → emission → schedule.
//!
//! # State machine
//! - `Idle`: auto-correction off or no eligible source
//! - `Sampling`: normal-rate analysis
//! - `Boosted`: high-rate analysis for a window after a cut
//! - `Blocked`: frame reads denied; the matrix is frozen and reads back off
//!
//! Ticks never overlap. The host sleeps for [`TickReport::delay`] between
//! ticks and passes the current [`Instant`] in, so the loop is testable
//! without real timers.

use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tonal_models::AutoConfig;
use tracing::{debug, info, warn};

use super::config::AnalysisConfig;
use super::diagnostics::DiagnosticsSnapshot;
use super::publish::{AutoMatrix, AutoMatrixPublisher};
use super::source::{FrameSource, SourceInfo};
use super::tone::ToneParams;
use crate::error::{EngineError, EngineResult};
use crate::matrix::ColorMatrix;
use crate::metrics;
use crate::scheduler::{AdaptiveScheduler, SchedulePhase};
use crate::stats::{cut_score, FrameStats, LumaField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    #[default]
    Idle,
    Sampling,
    Boosted,
    Blocked,
}

impl AnalysisPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPhase::Idle => "idle",
            AnalysisPhase::Sampling => "sampling",
            AnalysisPhase::Boosted => "boosted",
            AnalysisPhase::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything the auto feature remembers between ticks.
///
/// Reset when the feature is disabled and on every source discontinuity.
#[derive(Debug, Clone, Default)]
pub struct AutoState {
    pub phase: AnalysisPhase,
    pub current: ToneParams,
    pub target: ToneParams,
    pub stats_ema: Option<FrameStats>,
    pub last_stats: Option<FrameStats>,
    pub last_cut_score: f64,
    pub last_motion: f64,
    pub motion_ema: f64,
    pub motion_streak: u32,
    /// Set after the first successful sample
    pub primed: bool,
    pub boost_started: Option<Instant>,
    pub retry_at: Option<Instant>,
    pub last_updated: Option<Instant>,
    prev_field: Option<LumaField>,
    source_id: Option<String>,
    last_position: Option<f64>,
}

impl AutoState {
    /// Fresh state that still remembers the source it belongs to.
    fn reset_for(source: Option<&SourceInfo>) -> Self {
        Self {
            source_id: source.map(|s| s.id.clone()),
            last_position: source.map(|s| s.position),
            ..Self::default()
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub phase: AnalysisPhase,
    /// Sleep this long before the next tick
    pub delay: Duration,
    pub cut: bool,
    pub cut_score: f64,
    pub motion: f64,
    /// Whether a new auto-matrix was published
    pub emitted: bool,
    pub fps: f64,
}

pub struct SceneAnalysisEngine {
    config: AnalysisConfig,
    auto: AutoConfig,
    scheduler: AdaptiveScheduler,
    state: AutoState,
    publisher: AutoMatrixPublisher,
}

impl SceneAnalysisEngine {
    pub fn new(config: AnalysisConfig, auto: AutoConfig) -> Self {
        let scheduler = AdaptiveScheduler::new(config.scheduler.clone());
        let publisher = AutoMatrixPublisher::new(config.emit_throttle());
        Self {
            config,
            auto,
            scheduler,
            state: AutoState::default(),
            publisher,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn auto_config(&self) -> &AutoConfig {
        &self.auto
    }

    pub fn state(&self) -> &AutoState {
        &self.state
    }

    pub fn phase(&self) -> AnalysisPhase {
        self.state.phase
    }

    pub fn scheduler(&self) -> &AdaptiveScheduler {
        &self.scheduler
    }

    pub fn subscribe(&self) -> watch::Receiver<AutoMatrix> {
        self.publisher.subscribe()
    }

    pub fn auto_matrix(&self) -> AutoMatrix {
        self.publisher.current()
    }

    /// Apply new auto settings. Disabling resets state and forces identity.
    pub fn set_auto(&mut self, auto: AutoConfig, now: Instant) {
        let was_enabled = self.auto.enabled;
        self.auto = auto;
        if was_enabled && !auto.enabled {
            info!("Auto-correction disabled, resetting");
            self.disable(now);
        } else if !was_enabled && auto.enabled {
            info!(strength = auto.strength, lock_wb = auto.lock_white_balance, "Auto-correction enabled");
        }
    }

    /// Forget everything and publish identity.
    pub fn reset(&mut self, now: Instant) {
        self.state = AutoState::default();
        self.scheduler.reset();
        self.publisher.force(ColorMatrix::IDENTITY, now);
    }

    fn disable(&mut self, now: Instant) {
        self.reset(now);
        self.state.phase = AnalysisPhase::Idle;
    }

    /// Run one analysis tick against `source`.
    pub fn tick(&mut self, source: &mut dyn FrameSource, now: Instant) -> TickReport {
        let started = Instant::now();

        if !self.auto.enabled {
            if self.state.phase != AnalysisPhase::Idle || self.state.primed {
                self.disable(now);
            }
            self.state.phase = AnalysisPhase::Idle;
            return self.idle_report();
        }

        let info = match self.eligible_source(source) {
            Ok(info) => info,
            Err(e) => {
                debug!(error = %e, "Skipping analysis");
                return self.go_idle();
            }
        };

        if self.is_discontinuity(&info) {
            info!(source = %info.id, position = info.position, "Source discontinuity, resetting auto state");
            self.state = AutoState::reset_for(Some(&info));
            self.scheduler.reset();
        }
        self.state.source_id = Some(info.id.clone());
        self.state.last_position = Some(info.position);

        if self.state.phase == AnalysisPhase::Blocked {
            if let Some(retry_at) = self.state.retry_at {
                if now < retry_at {
                    return self.report(retry_at - now, false, false);
                }
            }
        }

        let frame = match source.analysis_frame() {
            Ok(frame) => frame,
            Err(blocked) => {
                let delay = self.scheduler.record_failure();
                self.state.phase = AnalysisPhase::Blocked;
                self.state.retry_at = Some(now + delay);
                self.state.boost_started = None;
                warn!(
                    reason = %blocked,
                    failures = self.scheduler.failures(),
                    backoff_ms = delay.as_millis() as u64,
                    "Frame read blocked, freezing auto-matrix"
                );
                metrics::record_blocked();
                return self.report(delay, false, false);
            }
        };

        if self.state.phase == AnalysisPhase::Blocked {
            info!(failures = self.scheduler.failures(), "Frame reads recovered");
            self.state.retry_at = None;
        }

        let surface = frame.resized(self.config.surface_width, self.config.surface_height);

        // Motion
        let field = LumaField::from_buffer(&surface);
        let motion = self
            .state
            .prev_field
            .as_ref()
            .map(|prev| field.motion_from(prev))
            .unwrap_or(1.0);
        self.state.prev_field = Some(field);
        self.state.motion_ema += (motion - self.state.motion_ema) * self.config.motion_ema_alpha;
        if self.state.motion_ema > self.config.motion_threshold {
            self.state.motion_streak = self.state.motion_streak.saturating_add(1);
        } else {
            self.state.motion_streak = 0;
        }

        // Statistics and cuts
        let stats = FrameStats::compute_or(&surface, self.state.last_stats.as_ref());
        let score = self
            .state
            .last_stats
            .as_ref()
            .map(|prev| cut_score(prev, &stats))
            .unwrap_or(0.0);
        let cut = self.state.last_stats.is_some() && score > self.config.cut_threshold;
        self.state.last_stats = Some(stats);
        self.state.last_cut_score = score;
        self.state.last_motion = motion;

        self.state.stats_ema = Some(match self.state.stats_ema {
            Some(ema) if !cut => ema.blend(&stats, self.config.stats_ema_alpha),
            _ => stats,
        });

        if cut {
            info!(cut_score = score, "Scene cut detected");
            metrics::record_cut();
            self.state.phase = AnalysisPhase::Boosted;
            self.state.boost_started = Some(now);
        } else if self.state.phase == AnalysisPhase::Boosted && !self.boost_active(now) {
            debug!("Boost window elapsed");
            self.state.phase = AnalysisPhase::Sampling;
            self.state.boost_started = None;
        } else if self.state.phase != AnalysisPhase::Boosted {
            self.state.phase = AnalysisPhase::Sampling;
        }

        // Targets
        let allowed =
            cut || self.state.motion_streak >= self.config.motion_ticks || !self.state.primed;
        if allowed {
            if let Some(ema) = &self.state.stats_ema {
                self.state.target =
                    ToneParams::derive(ema, self.auto.strength, self.auto.lock_white_balance);
            }
        }
        self.state.primed = true;

        // Smoothing and emission
        let step = if self.state.phase == AnalysisPhase::Boosted {
            self.config.boost_step
        } else {
            self.config.base_step
        };
        self.state.current = self.state.current.approach(&self.state.target, step, &self.config);
        let emitted = self.publisher.offer(self.state.current.to_matrix(), now);
        self.state.last_updated = Some(now);

        // Schedule
        self.scheduler.record_activity(score);
        let delay = self.scheduler.next_delay(self.schedule_phase(now));
        let report = self.report(delay, cut, emitted);

        debug!(
            phase = %report.phase,
            cut_score = score,
            motion,
            allowed,
            fps = report.fps,
            brightness = self.state.current.brightness,
            contrast = self.state.current.contrast,
            saturation = self.state.current.saturation,
            hue = self.state.current.hue,
            emitted,
            "Analysis tick"
        );
        metrics::record_tick(
            report.phase.as_str(),
            report.fps,
            started.elapsed().as_secs_f64() * 1000.0,
        );
        report
    }

    /// Whether auto is on and nothing has landed within the stale window.
    pub fn is_stale(&self, now: Instant) -> bool {
        if !self.auto.enabled {
            return false;
        }
        match self.state.last_updated {
            Some(at) => now.saturating_duration_since(at) > self.config.stale_after(),
            None => true,
        }
    }

    pub fn diagnostics(&self, now: Instant) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            phase: self.state.phase,
            auto_enabled: self.auto.enabled,
            raw: self.state.last_stats,
            ema: self.state.stats_ema,
            current: self.state.current,
            target: self.state.target,
            cut_score: self.state.last_cut_score,
            motion: self.state.last_motion,
            fps: self.scheduler.current_fps(),
            generation: self.publisher.generation(),
            last_updated_ms: self
                .state
                .last_updated
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            stale: self.is_stale(now),
        }
    }

    fn is_discontinuity(&self, info: &SourceInfo) -> bool {
        let Some(previous) = &self.state.source_id else {
            return false;
        };
        if *previous != info.id {
            return true;
        }
        matches!(
            self.state.last_position,
            Some(last) if last - info.position > self.config.restart_jump_secs
        )
    }

    fn boost_active(&self, now: Instant) -> bool {
        self.state
            .boost_started
            .map(|at| now.saturating_duration_since(at) < self.config.boost_window())
            .unwrap_or(false)
    }

    fn schedule_phase(&self, now: Instant) -> SchedulePhase {
        match (self.state.phase, self.state.boost_started) {
            (AnalysisPhase::Boosted, Some(at)) => SchedulePhase::Boost {
                early: now.saturating_duration_since(at) < self.config.early_boost(),
            },
            (AnalysisPhase::Blocked, _) => SchedulePhase::Blocked {
                failures: self.scheduler.failures(),
            },
            _ => SchedulePhase::Normal,
        }
    }

    fn eligible_source(&self, source: &dyn FrameSource) -> EngineResult<SourceInfo> {
        let info = source.info().ok_or(EngineError::NoEligibleSource)?;
        if let Some(reason) = info.ineligibility(&self.config) {
            debug!(source = %info.id, reason, "Source ineligible");
            return Err(EngineError::NoEligibleSource);
        }
        Ok(info)
    }

    fn go_idle(&mut self) -> TickReport {
        if self.state.phase != AnalysisPhase::Idle {
            info!(from = %self.state.phase, "Analysis idle");
        }
        self.state.phase = AnalysisPhase::Idle;
        self.state.boost_started = None;
        self.idle_report()
    }

    fn idle_report(&self) -> TickReport {
        self.report(self.scheduler.idle_delay(), false, false)
    }

    fn report(&self, delay: Duration, cut: bool, emitted: bool) -> TickReport {
        let fps = match self.state.phase {
            AnalysisPhase::Boosted | AnalysisPhase::Sampling => {
                1.0 / delay.as_secs_f64().max(1e-3)
            }
            _ => self.scheduler.current_fps(),
        };
        TickReport {
            phase: self.state.phase,
            delay,
            cut,
            cut_score: self.state.last_cut_score,
            motion: self.state.last_motion,
            emitted,
            fps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::source::ReadBlocked;
    use crate::frame::PixelBuffer;

    struct Scripted {
        info: Option<SourceInfo>,
        frames: Vec<Result<PixelBuffer, ReadBlocked>>,
        fallback: PixelBuffer,
    }

    impl Scripted {
        fn gray(level: u8) -> Self {
            Self {
                info: Some(SourceInfo::playing("clip", 640, 360)),
                frames: Vec::new(),
                fallback: PixelBuffer::filled(160, 90, [level, level, level, 255]),
            }
        }
    }

    impl FrameSource for Scripted {
        fn info(&self) -> Option<SourceInfo> {
            self.info.clone()
        }

        fn analysis_frame(&mut self) -> Result<PixelBuffer, ReadBlocked> {
            if self.frames.is_empty() {
                Ok(self.fallback.clone())
            } else {
                self.frames.remove(0)
            }
        }
    }

    fn enabled(strength: f64) -> AutoConfig {
        AutoConfig {
            enabled: true,
            strength,
            lock_white_balance: false,
        }
    }

    #[test]
    fn test_disabled_is_idle() {
        let mut engine = SceneAnalysisEngine::new(AnalysisConfig::default(), AutoConfig::default());
        let report = engine.tick(&mut Scripted::gray(100), Instant::now());
        assert_eq!(report.phase, AnalysisPhase::Idle);
        assert_eq!(report.delay, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_or_paused_source_is_not_eligible() {
        let engine = SceneAnalysisEngine::new(AnalysisConfig::default(), enabled(1.0));
        let mut source = Scripted::gray(100);
        assert!(engine.eligible_source(&source).is_ok());

        source.info = Some(SourceInfo {
            paused: true,
            ..SourceInfo::playing("clip", 640, 360)
        });
        assert!(matches!(
            engine.eligible_source(&source),
            Err(EngineError::NoEligibleSource)
        ));

        source.info = None;
        assert!(matches!(
            engine.eligible_source(&source),
            Err(EngineError::NoEligibleSource)
        ));
    }

    #[test]
    fn test_first_tick_samples_and_primes() {
        let mut engine = SceneAnalysisEngine::new(AnalysisConfig::default(), enabled(1.0));
        let report = engine.tick(&mut Scripted::gray(40), Instant::now());
        assert_eq!(report.phase, AnalysisPhase::Sampling);
        assert!(!report.cut);
        assert!(engine.state().primed);
        assert!(engine.state().target.brightness > 1.0);
        assert!(report.emitted);
    }

    #[test]
    fn test_no_source_is_idle() {
        let mut engine = SceneAnalysisEngine::new(AnalysisConfig::default(), enabled(1.0));
        let mut source = Scripted::gray(100);
        source.info = None;
        assert_eq!(engine.tick(&mut source, Instant::now()).phase, AnalysisPhase::Idle);
    }

    #[test]
    fn test_source_change_resets_state() {
        let t0 = Instant::now();
        let mut engine = SceneAnalysisEngine::new(AnalysisConfig::default(), enabled(1.0));
        let mut source = Scripted::gray(40);
        engine.tick(&mut source, t0);
        assert!(engine.state().last_stats.is_some());

        source.info = Some(SourceInfo::playing("other", 640, 360));
        let report = engine.tick(&mut source, t0 + Duration::from_millis(250));
        // Fresh state: the first sample after a reset is never a cut.
        assert!(!report.cut);
        assert_eq!(engine.state().last_cut_score, 0.0);
    }

    #[test]
    fn test_backwards_seek_is_discontinuity() {
        let engine = SceneAnalysisEngine::new(AnalysisConfig::default(), enabled(1.0));
        let mut state = engine.state.clone();
        state.source_id = Some("clip".into());
        state.last_position = Some(30.0);
        let engine = SceneAnalysisEngine { state, ..engine };
        assert!(engine.is_discontinuity(&SourceInfo::playing("clip", 640, 360).at(10.0)));
        assert!(!engine.is_discontinuity(&SourceInfo::playing("clip", 640, 360).at(29.5)));
    }

    #[test]
    fn test_disable_forces_identity() {
        let t0 = Instant::now();
        let mut engine = SceneAnalysisEngine::new(AnalysisConfig::default(), enabled(1.0));
        engine.tick(&mut Scripted::gray(30), t0);
        assert!(!engine.auto_matrix().matrix.is_identity(1e-9));

        engine.set_auto(AutoConfig::default(), t0 + Duration::from_millis(10));
        assert_eq!(engine.auto_matrix().matrix, ColorMatrix::IDENTITY);
        assert_eq!(engine.phase(), AnalysisPhase::Idle);
        assert!(!engine.state().primed);
    }

    #[test]
    fn test_stale_liveness() {
        let t0 = Instant::now();
        let mut engine = SceneAnalysisEngine::new(AnalysisConfig::default(), enabled(0.5));
        assert!(engine.is_stale(t0));
        engine.tick(&mut Scripted::gray(100), t0);
        assert!(!engine.is_stale(t0 + Duration::from_secs(5)));
        assert!(engine.is_stale(t0 + Duration::from_secs(11)));
        let snapshot = engine.diagnostics(t0 + Duration::from_secs(11));
        assert!(snapshot.stale);
        assert_eq!(snapshot.last_updated_ms, Some(11_000));
    }
}
