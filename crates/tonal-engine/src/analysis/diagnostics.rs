//! Snapshot for scope/diagnostics and status-indicator collaborators.

use serde::Serialize;

use super::engine::AnalysisPhase;
use super::tone::ToneParams;
use crate::stats::FrameStats;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub phase: AnalysisPhase,
    pub auto_enabled: bool,
    /// Statistics of the latest successful sample
    pub raw: Option<FrameStats>,
    pub ema: Option<FrameStats>,
    pub current: ToneParams,
    pub target: ToneParams,
    pub cut_score: f64,
    pub motion: f64,
    pub fps: f64,
    pub generation: u64,
    /// Milliseconds since the last successful sample
    pub last_updated_ms: Option<u64>,
    /// Auto-correction is on but nothing has landed within the stale window
    pub stale: bool,
}

impl DiagnosticsSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
