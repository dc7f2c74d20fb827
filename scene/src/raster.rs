//! Decoded images as the scene sees them.
//!
//! A [`Raster`] always knows its native dimensions. Its pixels may be missing
//! (the host could size the image but not read it back), and it remembers
//! whether it came from a cross-origin fetch: drawing such a raster taints the
//! export surface, exactly like a browser canvas.

#[cfg(test)]
#[path = "raster_test.rs"]
mod raster_test;

use std::fmt;
use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::geom::Size;

/// Errors produced while building a raster.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// The image has zero width or height.
    #[error("image has zero width or height")]
    Empty,
    /// The bytes could not be decoded as a supported image format.
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Where a raster's bytes came from, relative to the editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    /// Loaded with permission to read pixels back (CORS-approved, pasted, local).
    #[default]
    SameOrigin,
    /// Loaded without read-back permission; taints any surface it is drawn on.
    CrossOrigin,
}

/// A decoded image: native dimensions plus (optionally) its RGBA pixels.
#[derive(Clone)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Option<Arc<RgbaImage>>,
    origin: Origin,
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("has_pixels", &self.pixels.is_some())
            .field("origin", &self.origin)
            .finish()
    }
}

impl Raster {
    /// Wrap an RGBA buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Empty`] if either dimension is zero.
    pub fn from_rgba(image: RgbaImage, origin: Origin) -> Result<Self, RasterError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(RasterError::Empty);
        }
        Ok(Self { width, height, pixels: Some(Arc::new(image)), origin })
    }

    /// Decode encoded image bytes (PNG, JPEG, GIF, WebP, BMP).
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Decode`] for unreadable bytes and
    /// [`RasterError::Empty`] for zero-sized images.
    pub fn decode(bytes: &[u8], origin: Origin) -> Result<Self, RasterError> {
        let decoded = image::load_from_memory(bytes)?;
        Self::from_rgba(decoded.to_rgba8(), origin)
    }

    /// A raster whose size is known but whose pixels cannot be read.
    ///
    /// Such objects are placed and hit-tested normally but skipped by export.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Empty`] if either dimension is zero.
    pub fn unavailable(width: u32, height: u32) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::Empty);
        }
        Ok(Self { width, height, pixels: None, origin: Origin::SameOrigin })
    }

    /// A raster filled with one colour.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::Empty`] if either dimension is zero.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4], origin: Origin) -> Result<Self, RasterError> {
        Self::from_rgba(RgbaImage::from_pixel(width, height, Rgba(rgba)), origin)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Native dimensions as a [`Size`].
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    /// The pixel buffer, if it can be read.
    #[must_use]
    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_deref()
    }

    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    #[must_use]
    pub fn is_cross_origin(&self) -> bool {
        self.origin == Origin::CrossOrigin
    }
}
