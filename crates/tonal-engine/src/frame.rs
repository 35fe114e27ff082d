//! RGBA8 pixel buffers exchanged with frame-acquisition collaborators.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::path::Path;

use crate::error::{EngineError, EngineResult};

/// Tightly packed RGBA8 buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA8 bytes, validating the length.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> EngineResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(EngineError::invalid_buffer(format!(
                "expected {expected} bytes for {width}x{height}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Buffer with every pixel set to `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * 4);
        for _ in 0..count {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Build a buffer from a per-pixel generator.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Load any format supported by the `image` crate.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let img = image::open(path.as_ref())?.to_rgba8();
        Ok(Self::from_image(img))
    }

    pub fn from_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }

    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Draw this frame onto an analysis surface of the given size.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if self.width == width && self.height == height {
            return self.clone();
        }
        match self.to_image() {
            Some(img) => Self::from_image(imageops::resize(&img, width, height, FilterType::Triangle)),
            None => Self::filled(width, height, [0, 0, 0, 255]),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Iterate pixels as `[r, g, b, a]` slices.
    pub fn pixels(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(4)
    }

    /// Save as PNG (or any extension the `image` crate understands).
    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        image::save_buffer(
            path.as_ref(),
            &self.data,
            self.width,
            self.height,
            image::ColorType::Rgba8,
        )?;
        Ok(())
    }
}
