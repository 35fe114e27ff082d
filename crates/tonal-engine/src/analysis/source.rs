//! Frame-acquisition seam.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::AnalysisConfig;
use crate::error::EngineError;
use crate::frame::PixelBuffer;

/// Playback state of the current source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Stable identity; a change is a discontinuity
    pub id: String,
    /// Playback position in seconds
    pub position: f64,
    pub paused: bool,
    pub seeking: bool,
    pub ended: bool,
    pub visible: bool,
    pub width: u32,
    pub height: u32,
}

impl SourceInfo {
    /// A visible, playing source at position zero.
    pub fn playing(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            position: 0.0,
            paused: false,
            seeking: false,
            ended: false,
            visible: true,
            width,
            height,
        }
    }

    pub fn at(mut self, position: f64) -> Self {
        self.position = position;
        self
    }

    /// Why the source cannot be analyzed, if it cannot.
    pub fn ineligibility(&self, config: &AnalysisConfig) -> Option<&'static str> {
        if self.paused {
            Some("paused")
        } else if self.seeking {
            Some("seeking")
        } else if self.ended {
            Some("ended")
        } else if !self.visible {
            Some("invisible")
        } else if self.width < config.min_source_width || self.height < config.min_source_height {
            Some("too small")
        } else {
            None
        }
    }

    pub fn is_eligible(&self, config: &AnalysisConfig) -> bool {
        self.ineligibility(config).is_none()
    }
}

/// A frame read was denied (protected or cross-origin content).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ReadBlocked {
    pub reason: String,
}

impl ReadBlocked {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<ReadBlocked> for EngineError {
    fn from(err: ReadBlocked) -> Self {
        EngineError::read_blocked(err.reason)
    }
}

/// Supplies frames to the analysis loop.
///
/// Called at the scheduler's cadence; a read is a bounded synchronous
/// operation that either yields pixels or fails with [`ReadBlocked`].
pub trait FrameSource {
    /// The current source, or `None` when nothing is attached.
    fn info(&self) -> Option<SourceInfo>;

    /// Read the current frame at any resolution.
    fn analysis_frame(&mut self) -> Result<PixelBuffer, ReadBlocked>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility() {
        let config = AnalysisConfig::default();
        let info = SourceInfo::playing("a", 1280, 720);
        assert!(info.is_eligible(&config));

        let paused = SourceInfo {
            paused: true,
            ..info.clone()
        };
        assert_eq!(paused.ineligibility(&config), Some("paused"));

        let small = SourceInfo::playing("a", 32, 32);
        assert_eq!(small.ineligibility(&config), Some("too small"));
    }

    #[test]
    fn test_read_blocked_converts() {
        let err: EngineError = ReadBlocked::new("tainted canvas").into();
        assert!(matches!(&err, EngineError::ReadBlocked { reason } if reason == "tainted canvas"));
        assert!(!err.is_reportable());
    }
}
