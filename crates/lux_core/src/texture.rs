//! Bitmap images used by texture and emitter plugins.
//!
//! Pixels are stored as linear RGBA floats. Relative filenames are looked up
//! through the current file resolver.

use std::path::{Path, PathBuf};

use lux_math::Color;
use thiserror::Error;

use crate::resolver::FileResolver;

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("texture file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("bitmap of {width}x{height} needs {expected} pixels, got {actual}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

pub type TextureResult<T> = Result<T, TextureError>;

/// A decoded image in linear RGBA.
#[derive(Clone, Debug)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,

    /// Row-major pixels, top row first
    pub pixels: Vec<[f32; 4]>,

    /// Resolved file path, empty for generated bitmaps
    pub path: PathBuf,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<[f32; 4]>) -> TextureResult<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected || expected == 0 {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            path: PathBuf::new(),
        })
    }

    /// A 1x1 bitmap of `color`.
    pub fn solid(color: Color) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![[color.r, color.g, color.b, 1.0]],
            path: PathBuf::new(),
        }
    }

    /// Resolve `filename` and decode it. With `srgb` set, color channels are
    /// converted from sRGB to linear.
    pub fn load(filename: impl AsRef<Path>, resolver: &FileResolver, srgb: bool) -> TextureResult<Self> {
        let path = resolver.resolve(filename);
        if !path.exists() {
            return Err(TextureError::NotFound(path));
        }
        let image = image::open(&path).map_err(|source| TextureError::Decode {
            path: path.clone(),
            source,
        })?;

        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let channel = |value: u8| {
            if srgb {
                srgb_to_linear(value)
            } else {
                value as f32 / 255.0
            }
        };
        let pixels = rgba
            .pixels()
            .map(|p| [channel(p[0]), channel(p[1]), channel(p[2]), p[3] as f32 / 255.0])
            .collect();

        log::debug!("loaded bitmap {} ({width}x{height})", path.display());
        Ok(Self {
            width,
            height,
            pixels,
            path,
        })
    }

    /// Bilinear lookup with wrapping; `(0, 0)` is the bottom-left corner.
    pub fn sample(&self, u: f32, v: f32) -> Color {
        let x = u.rem_euclid(1.0) * (self.width as f32 - 1.0);
        let y = (1.0 - v.rem_euclid(1.0)) * (self.height as f32 - 1.0);

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let fx = x.fract();
        let fy = y.fract();

        let lerp = |a: [f32; 4], b: [f32; 4], t: f32| {
            Color::new(
                a[0] + (b[0] - a[0]) * t,
                a[1] + (b[1] - a[1]) * t,
                a[2] + (b[2] - a[2]) * t,
            )
        };
        let top = lerp(self.pixel(x0, y0), self.pixel(x1, y0), fx);
        let bottom = lerp(self.pixel(x0, y1), self.pixel(x1, y1), fx);
        top * (1.0 - fy) + bottom * fy
    }

    /// Average color over all pixels.
    pub fn mean(&self) -> Color {
        let sum = self
            .pixels
            .iter()
            .fold(Color::BLACK, |acc, p| acc + Color::new(p[0], p[1], p[2]));
        sum * (1.0 / self.pixels.len().max(1) as f32)
    }

    fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        let index = y as usize * self.width as usize + x as usize;
        self.pixels.get(index).copied().unwrap_or([0.0, 0.0, 0.0, 1.0])
    }
}

/// sRGB transfer function, inverted.
pub fn srgb_to_linear(value: u8) -> f32 {
    let v = value as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}
