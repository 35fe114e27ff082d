//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tonal_engine::AnalysisConfig;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory of still frames played back as the analysis source
    pub frames_dir: Option<PathBuf>,
    /// Playback duration of each still frame
    pub frame_duration: Duration,
    /// Loop the still frames instead of ending
    pub loop_frames: bool,
    /// Persisted settings record loaded at startup
    pub settings_path: Option<PathBuf>,
    /// JSON overrides for the analysis loop tuning
    pub analysis_config_path: Option<PathBuf>,
    /// Where to write the ffmpeg filter on every recompile
    pub filter_out: Option<PathBuf>,
    /// Prometheus listener address
    pub metrics_addr: Option<SocketAddr>,
    /// Stop after this many analysis ticks
    pub max_ticks: Option<u64>,
    /// Capacity of the parameter update channel
    pub update_buffer: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            frames_dir: None,
            frame_duration: Duration::from_millis(40),
            loop_frames: true,
            settings_path: None,
            analysis_config_path: None,
            filter_out: None,
            metrics_addr: None,
            max_ticks: None,
            update_buffer: 32,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frames_dir: std::env::var("TONAL_FRAMES_DIR").ok().map(PathBuf::from),
            frame_duration: Duration::from_millis(
                std::env::var("TONAL_FRAME_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(40),
            ),
            loop_frames: std::env::var("TONAL_LOOP_FRAMES")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.loop_frames),
            settings_path: std::env::var("TONAL_SETTINGS").ok().map(PathBuf::from),
            analysis_config_path: std::env::var("TONAL_ANALYSIS_CONFIG").ok().map(PathBuf::from),
            filter_out: std::env::var("TONAL_FILTER_OUT").ok().map(PathBuf::from),
            metrics_addr: std::env::var("TONAL_METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
            max_ticks: std::env::var("TONAL_MAX_TICKS")
                .ok()
                .and_then(|s| s.parse().ok()),
            update_buffer: std::env::var("TONAL_UPDATE_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.update_buffer),
        }
    }

    /// Analysis tuning, read from [`Self::analysis_config_path`] when set.
    pub fn analysis_config(&self) -> WorkerResult<AnalysisConfig> {
        let Some(path) = &self.analysis_config_path else {
            return Ok(AnalysisConfig::default());
        };
        let json = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&json)?;
        if config.scheduler.min_fps <= 0.0 || config.scheduler.min_fps > config.scheduler.max_fps {
            return Err(WorkerError::config_error(format!(
                "invalid sampling range {}..{} fps",
                config.scheduler.min_fps, config.scheduler.max_fps
            )));
        }
        Ok(config)
    }

    /// Raw persisted settings JSON, if a settings file is configured and present.
    pub fn settings_json(&self) -> Option<String> {
        let path = self.settings_path.as_ref()?;
        std::fs::read_to_string(path).ok()
    }
}
