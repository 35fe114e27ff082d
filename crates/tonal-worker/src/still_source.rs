//! Frame source backed by still images.
//!
//! Each read returns the frame under the playhead and advances it by one
//! frame. Frames that failed to decode are reported as blocked reads so the
//! engine's backoff path can be exercised from disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tonal_engine::{FrameSource, PixelBuffer, ReadBlocked, SourceInfo};
use tracing::{debug, info, warn};

use crate::error::{WorkerError, WorkerResult};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// A decoded frame or the reason it could not be read.
type Slot = Result<PixelBuffer, String>;

#[derive(Debug)]
pub struct StillSource {
    id: String,
    frames: Vec<Slot>,
    cursor: usize,
    frame_duration: Duration,
    looping: bool,
    width: u32,
    height: u32,
}

impl StillSource {
    /// Play back in-memory frames.
    pub fn from_frames(
        id: impl Into<String>,
        frames: Vec<PixelBuffer>,
        frame_duration: Duration,
        looping: bool,
    ) -> WorkerResult<Self> {
        let id = id.into();
        if frames.is_empty() {
            return Err(WorkerError::NoFrames(id));
        }
        Self::from_slots(id, frames.into_iter().map(Ok).collect(), frame_duration, looping)
    }

    /// Decode every image in `dir`, sorted by file name.
    pub fn open_dir(dir: &Path, frame_duration: Duration, looping: bool) -> WorkerResult<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        paths.sort();

        let slots: Vec<Slot> = paths
            .iter()
            .map(|path| {
                PixelBuffer::open(path).map_err(|e| {
                    warn!(path = %path.display(), error = %e, "Unreadable frame");
                    format!("{}: {e}", path.display())
                })
            })
            .collect();

        let id = dir.display().to_string();
        if slots.is_empty() {
            return Err(WorkerError::NoFrames(id));
        }
        info!(dir = %id, frames = slots.len(), "Loaded still frames");
        Self::from_slots(id, slots, frame_duration, looping)
    }

    /// A short built-in reel with two hard cuts.
    pub fn demo_reel(frame_duration: Duration) -> WorkerResult<Self> {
        let scenes: [(usize, [u8; 3]); 3] = [(60, [38, 34, 30]), (60, [235, 205, 120]), (60, [60, 90, 150])];
        let mut frames = Vec::new();
        for (count, base) in scenes {
            for i in 0..count {
                let drift = (i % 8) as u8;
                frames.push(PixelBuffer::from_fn(160, 90, |x, y| {
                    let shade = ((x + y) / 20) as u8;
                    [
                        base[0].saturating_add(shade).saturating_add(drift),
                        base[1].saturating_add(shade),
                        base[2].saturating_add(shade),
                        255,
                    ]
                }));
            }
        }
        Self::from_frames("demo-reel", frames, frame_duration, true)
    }

    fn from_slots(
        id: String,
        frames: Vec<Slot>,
        frame_duration: Duration,
        looping: bool,
    ) -> WorkerResult<Self> {
        let (width, height) = frames
            .iter()
            .find_map(|slot| slot.as_ref().ok().map(|f| (f.width(), f.height())))
            .ok_or_else(|| WorkerError::NoFrames(id.clone()))?;
        Ok(Self {
            id,
            frames,
            cursor: 0,
            frame_duration,
            looping,
            width,
            height,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn ended(&self) -> bool {
        !self.looping && self.cursor >= self.frames.len()
    }

    fn position(&self) -> f64 {
        let index = if self.looping {
            self.cursor % self.frames.len()
        } else {
            self.cursor.min(self.frames.len())
        };
        index as f64 * self.frame_duration.as_secs_f64()
    }
}

impl FrameSource for StillSource {
    fn info(&self) -> Option<SourceInfo> {
        Some(SourceInfo {
            ended: self.ended(),
            ..SourceInfo::playing(self.id.clone(), self.width, self.height).at(self.position())
        })
    }

    fn analysis_frame(&mut self) -> Result<PixelBuffer, ReadBlocked> {
        if self.ended() {
            return Err(ReadBlocked::new("source ended"));
        }
        let index = self.cursor % self.frames.len();
        self.cursor += 1;
        if self.looping && self.cursor % self.frames.len() == 0 {
            debug!(source = %self.id, "Looping still frames");
        }
        self.frames[index].clone().map_err(ReadBlocked::new)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
