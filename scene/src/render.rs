//! Rendering: a deterministic software rasterizer for the scene.
//!
//! Two entry points share one drawing path. [`draw_viewport`] paints the
//! interactive surface at canvas size, including the selection outline.
//! [`export_png`] flattens the scene letterboxed into a fixed-size target and
//! encodes it as PNG.
//!
//! Every object is drawn the way a 2D context would: translate to the center of
//! its box, rotate, scale, then draw the image centered on the origin. Each
//! destination pixel is inverse-mapped into the object's local space and
//! sampled bilinearly from the source raster, then blended source-over.
//!
//! A [`Surface`] that has had cross-origin pixels drawn on it is tainted and
//! refuses to encode, which is the one way the whole export can fail.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::consts::{MAX_EXPORT_SIDE_PX, SELECTION_GAP_PX, SELECTION_RGBA, SELECTION_STROKE_PX};
use crate::doc::{Scene, SceneObject};
use crate::geom::{Affine, Letterbox, Point, Size};

/// Errors that abort a whole export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export target {width}x{height} is not usable")]
    InvalidTarget { width: u32, height: u32 },
    #[error("surface is tainted by cross-origin image data")]
    Tainted,
    #[error("png encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// A colour string that is not `#rgb` or `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex colour {0:?}")]
pub struct ColorError(pub String);

/// Parse a CSS hex colour (`#rgb` or `#rrggbb`) into opaque RGBA.
///
/// # Errors
///
/// Returns [`ColorError`] for anything else.
pub fn parse_hex_color(s: &str) -> Result<Rgba<u8>, ColorError> {
    let err = || ColorError(s.to_owned());
    let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(err());
    }
    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| err());
    match hex.len() {
        3 => {
            let mut out = [0xff_u8; 4];
            for (i, slot) in out.iter_mut().take(3).enumerate() {
                let v = channel(&hex[i..=i])?;
                *slot = v * 17;
            }
            Ok(Rgba(out))
        }
        6 => Ok(Rgba([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?, 0xff])),
        _ => Err(err()),
    }
}

// =============================================================
// Surface
// =============================================================

/// An axis-aligned rectangle in an object's local space, half-open.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min: Point,
    max: Point,
}

impl Bounds {
    fn centered(size: Size) -> Self {
        Self {
            min: Point::new(-size.width / 2.0, -size.height / 2.0),
            max: Point::new(size.width / 2.0, size.height / 2.0),
        }
    }

    fn inflated(self, by: f64) -> Self {
        Self {
            min: Point::new(self.min.x - by, self.min.y - by),
            max: Point::new(self.max.x + by, self.max.y + by),
        }
    }

    fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }
}

/// An RGBA drawing target that tracks cross-origin taint.
#[derive(Debug, Clone)]
pub struct Surface {
    image: RgbaImage,
    tainted: bool,
}

impl Surface {
    /// A surface of the given size filled with `background`.
    #[must_use]
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        Self { image: RgbaImage::from_pixel(width, height, background), tainted: false }
    }

    #[must_use]
    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    /// The pixels drawn so far. Reading is always allowed in-process; only
    /// [`Surface::into_png`] enforces the taint rule.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Encode as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Tainted`] if cross-origin pixels were drawn, or
    /// [`ExportError::Encode`] if the encoder fails.
    pub fn into_png(self) -> Result<Vec<u8>, ExportError> {
        if self.tainted {
            return Err(ExportError::Tainted);
        }
        let mut out = Cursor::new(Vec::new());
        self.image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Draw one scene object under `base`. Returns `false` when the object's
    /// pixels are unavailable and it was skipped.
    pub fn draw_object(&mut self, obj: &SceneObject, base: Affine) -> bool {
        let Some(pixels) = obj.raster.pixels() else {
            tracing::debug!(id = %obj.id, "skipping object with unavailable pixels");
            return false;
        };
        if obj.raster.is_cross_origin() {
            self.tainted = true;
        }
        let bounds = Bounds::centered(obj.size);
        let sx = f64::from(pixels.width()) / obj.size.width;
        let sy = f64::from(pixels.height()) / obj.size.height;
        self.fill_local(object_transform(obj, base), bounds, |local| {
            let u = (local.x - bounds.min.x) * sx - 0.5;
            let v = (local.y - bounds.min.y) * sy - 0.5;
            Some(sample_bilinear(pixels, u, v))
        });
        true
    }

    /// Stroke the selection outline around `obj`, rotated and scaled with it.
    pub fn draw_selection(&mut self, obj: &SceneObject, base: Affine) {
        let half = SELECTION_STROKE_PX / 2.0;
        let ring = Bounds::centered(obj.size).inflated(SELECTION_GAP_PX);
        let outer = ring.inflated(half);
        let inner = ring.inflated(-half);
        let color = Rgba(SELECTION_RGBA);
        self.fill_local(object_transform(obj, base), outer, |local| {
            if inner.contains(local) { None } else { Some(color) }
        });
    }

    /// Visit every surface pixel whose center maps into `bounds` under
    /// `transform`, blending whatever `shade` returns for the local point.
    fn fill_local<F>(&mut self, transform: Affine, bounds: Bounds, mut shade: F)
    where
        F: FnMut(Point) -> Option<Rgba<u8>>,
    {
        let Some(inverse) = transform.inverse() else {
            return;
        };
        let mapped = bounds.corners().map(|p| transform.apply(p));
        let min_x = mapped.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = mapped.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = mapped.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = mapped.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        if !(min_x.is_finite() && max_x.is_finite() && min_y.is_finite() && max_y.is_finite()) {
            return;
        }

        let (width, height) = self.image.dimensions();
        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = max_x.ceil().min(f64::from(width)) as u32;
        let y1 = max_y.ceil().min(f64::from(height)) as u32;

        for py in y0..y1 {
            for px in x0..x1 {
                let local = inverse.apply(Point::new(f64::from(px) + 0.5, f64::from(py) + 0.5));
                if !bounds.contains(local) {
                    continue;
                }
                if let Some(src) = shade(local) {
                    let dst = self.image.get_pixel_mut(px, py);
                    *dst = alpha_blend(*dst, src);
                }
            }
        }
    }
}

/// Translate to the box center, rotate, then scale, all under `base`.
fn object_transform(obj: &SceneObject, base: Affine) -> Affine {
    let center = obj.center();
    base.translated(center.x, center.y)
        .rotated(obj.rotation)
        .scaled(obj.scale, obj.scale)
}

/// Bilinear sample at `(x, y)` in pixel space, clamping to the edge.
fn sample_bilinear(img: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = img.dimensions();
    let max_x = i64::from(w) - 1;
    let max_y = i64::from(h) - 1;
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let sample = |sx: i64, sy: i64| -> [f64; 4] {
        let p = img.get_pixel(sx.clamp(0, max_x) as u32, sy.clamp(0, max_y) as u32).0;
        [f64::from(p[0]), f64::from(p[1]), f64::from(p[2]), f64::from(p[3])]
    };

    let p00 = sample(x0, y0);
    let p10 = sample(x0 + 1, y0);
    let p01 = sample(x0, y0 + 1);
    let p11 = sample(x0 + 1, y0 + 1);

    let w00 = (1.0 - fx) * (1.0 - fy);
    let w10 = fx * (1.0 - fy);
    let w01 = (1.0 - fx) * fy;
    let w11 = fx * fy;

    let mut out = [0_u8; 4];
    for (i, slot) in out.iter_mut().enumerate() {
        let v = p00[i] * w00 + p10[i] * w10 + p01[i] * w01 + p11[i] * w11;
        *slot = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Source-over compositing of `src` onto `dst`.
fn alpha_blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 || dst[3] == 0 {
        return src;
    }
    let sa = f64::from(src[3]) / 255.0;
    let da = f64::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mut out = [0_u8; 4];
    for (i, slot) in out.iter_mut().take(3).enumerate() {
        let v = (f64::from(src[i]) * sa + f64::from(dst[i]) * da * (1.0 - sa)) / out_a;
        *slot = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

// =============================================================
// Entry points
// =============================================================

/// Paint the interactive surface at canvas size: background, objects in
/// paint order, then the selection outline on top.
#[must_use]
pub fn draw_viewport(scene: &Scene, background: Rgba<u8>) -> RgbaImage {
    let canvas = scene.canvas_size();
    let width = canvas.width.ceil().min(f64::from(MAX_EXPORT_SIDE_PX)) as u32;
    let height = canvas.height.ceil().min(f64::from(MAX_EXPORT_SIDE_PX)) as u32;
    let mut surface = Surface::new(width, height, background);
    for obj in scene.objects() {
        surface.draw_object(obj, Affine::IDENTITY);
    }
    if let Some(selected) = scene.selected() {
        surface.draw_selection(selected, Affine::IDENTITY);
    }
    surface.into_image()
}

/// Flatten the scene into a `width × height` surface, letterboxed and
/// centered, skipping objects whose pixels are unavailable.
///
/// # Errors
///
/// Returns [`ExportError::InvalidTarget`] for zero-sized or oversized targets.
pub fn flatten(scene: &Scene, background: Rgba<u8>, width: u32, height: u32) -> Result<Surface, ExportError> {
    let invalid = || ExportError::InvalidTarget { width, height };
    if width > MAX_EXPORT_SIDE_PX || height > MAX_EXPORT_SIDE_PX {
        return Err(invalid());
    }
    let target = Size::new(f64::from(width), f64::from(height));
    let fit = Letterbox::fit(scene.canvas_size(), target).ok_or_else(invalid)?;
    let base = fit.transform();

    let mut surface = Surface::new(width, height, background);
    let mut skipped = 0_usize;
    for obj in scene.objects() {
        if !surface.draw_object(obj, base) {
            skipped += 1;
        }
    }
    tracing::debug!(width, height, objects = scene.len(), skipped, scale = fit.scale, "flattened scene");
    Ok(surface)
}

/// [`flatten`] then encode as PNG.
///
/// # Errors
///
/// Any [`ExportError`]; a cross-origin object yields [`ExportError::Tainted`].
pub fn export_png(scene: &Scene, background: Rgba<u8>, width: u32, height: u32) -> Result<Vec<u8>, ExportError> {
    flatten(scene, background, width, height)?.into_png()
}
