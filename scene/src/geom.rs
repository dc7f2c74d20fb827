//! Geometry primitives shared by placement, hit-testing and rendering.
//!
//! All coordinates are `f64` canvas pixels with the origin at the top-left
//! corner and `y` growing downward, matching a 2D canvas context.

#[cfg(test)]
#[path = "geom_test.rs"]
mod geom_test;

use serde::{Deserialize, Serialize};

/// Determinants smaller than this are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// A point in canvas or export space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn area(self) -> f64 {
        self.width * self.height
    }

    /// True when either dimension is zero, negative, or not finite.
    #[must_use]
    pub fn is_degenerate(self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }

    /// Both dimensions multiplied by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self { width: self.width * factor, height: self.height * factor }
    }
}

/// A 2D affine transform in canvas-context form.
///
/// Maps `(x, y)` to `(a·x + c·y + e, b·x + d·y + f)`. The builder methods
/// post-multiply, so a chain reads in the same order as the equivalent
/// `translate` / `rotate` / `scale` calls on a canvas context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    #[must_use]
    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self {
            e: self.a * dx + self.c * dy + self.e,
            f: self.b * dx + self.d * dy + self.f,
            ..self
        }
    }

    /// Rotate by `radians` (clockwise on screen, since `y` points down).
    #[must_use]
    pub fn rotated(self, radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self {
            a: self.a * cos + self.c * sin,
            b: self.b * cos + self.d * sin,
            c: self.c * cos - self.a * sin,
            d: self.d * cos - self.b * sin,
            ..self
        }
    }

    #[must_use]
    pub fn scaled(self, sx: f64, sy: f64) -> Self {
        Self { a: self.a * sx, b: self.b * sx, c: self.c * sy, d: self.d * sy, ..self }
    }

    /// Map a point through the transform.
    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    /// The inverse transform, or `None` when the transform is singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return None;
        }
        Some(Affine {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }
}

/// Uniform scale plus centering offset that fits one rectangle inside another.
///
/// Used by export to letterbox the working canvas into the target raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f64,
    pub offset: Point,
}

impl Letterbox {
    /// Fit `content` into `target`, preserving aspect ratio and centering.
    ///
    /// Returns `None` when either size is degenerate.
    #[must_use]
    pub fn fit(content: Size, target: Size) -> Option<Self> {
        if content.is_degenerate() || target.is_degenerate() {
            return None;
        }
        let scale = (target.width / content.width).min(target.height / content.height);
        let offset = Point::new(
            (target.width - content.width * scale) / 2.0,
            (target.height - content.height * scale) / 2.0,
        );
        Some(Self { scale, offset })
    }

    /// The transform from content space into target space.
    #[must_use]
    pub fn transform(&self) -> Affine {
        Affine::IDENTITY
            .translated(self.offset.x, self.offset.y)
            .scaled(self.scale, self.scale)
    }
}
