//! Engine metrics collection.
//!
//! Provides standardized metrics for monitoring the analysis loop:
//! - Tick and cut counters by phase
//! - Blocked reads and shader fallbacks
//! - Auto-matrix emissions
//! - Sampling rate gauge and tick latency histogram

use metrics::{counter, gauge, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Analysis ticks by resulting phase.
    pub const TICKS_TOTAL: &str = "tonal_analysis_ticks_total";

    /// Detected scene cuts.
    pub const CUTS_TOTAL: &str = "tonal_cuts_total";

    /// Frame reads that were blocked.
    pub const BLOCKED_READS_TOTAL: &str = "tonal_blocked_reads_total";

    /// Shader builds that fell back to the filter graph.
    pub const SHADER_FALLBACKS: &str = "tonal_shader_fallbacks_total";

    /// Auto-matrix values published to readers.
    pub const EMISSIONS_TOTAL: &str = "tonal_auto_matrix_emissions_total";

    /// Current sampling rate in frames per second.
    pub const SAMPLING_FPS: &str = "tonal_sampling_fps";

    /// Tick processing time in seconds.
    pub const TICK_SECONDS: &str = "tonal_tick_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record a completed tick.
pub fn record_tick(phase: &str, fps: f64, elapsed_ms: f64) {
    counter!(names::TICKS_TOTAL, "phase" => phase.to_string()).increment(1);
    gauge!(names::SAMPLING_FPS).set(fps);
    histogram!(names::TICK_SECONDS).record(elapsed_ms / 1000.0);
}

/// Record a detected cut.
pub fn record_cut() {
    counter!(names::CUTS_TOTAL).increment(1);
}

/// Record a blocked frame read.
pub fn record_blocked() {
    counter!(names::BLOCKED_READS_TOTAL).increment(1);
}

/// Record an auto-matrix publication.
pub fn record_emission() {
    counter!(names::EMISSIONS_TOTAL).increment(1);
}

// =============================================================================
// Tests
// =============================================================================
