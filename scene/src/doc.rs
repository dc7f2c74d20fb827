//! Scene model: placed image objects and the ordered in-memory store.
//!
//! A [`SceneObject`] keeps two position representations. `position` (top-left,
//! canvas pixels) is authoritative while the object is being moved; `fraction`
//! (center as a share of canvas width/height) is authoritative when the canvas
//! is resized. Every mutation funnels through [`settle`], which clamps the
//! top-left into bounds first and only then re-derives the fraction, so the
//! two can never disagree.
//!
//! [`Scene`] owns the objects in paint order (later entries are drawn on top)
//! together with the canvas size and the single selection.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::{INITIAL_FRACTION, MAX_AREA_FRACTION, MIN_DIMENSION_PX};
use crate::geom::{Point, Size};
use crate::raster::Raster;

/// Unique identifier for a scene object.
pub type ObjectId = Uuid;

/// Errors from scene mutations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("canvas size {width}x{height} is not usable")]
    InvalidCanvas { width: f64, height: f64 },
    #[error("image has no area")]
    EmptyImage,
    #[error("scale factor {0} must be finite and positive")]
    InvalidScale(f64),
    #[error("rotation {0} is not finite")]
    InvalidRotation(f64),
    #[error("position ({x}, {y}) is not finite")]
    InvalidPosition { x: f64, y: f64 },
    #[error("object {0} not found")]
    NotFound(ObjectId),
}

/// Where an object's image came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "lowercase")]
pub enum ObjectSource {
    /// Fetched from this URL; listed as a product link on publish.
    Url(String),
    /// Pasted or loaded locally; never listed as a product link.
    Pasted,
}

impl ObjectSource {
    /// The source URL, or `None` for pasted images.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Pasted => None,
        }
    }
}

/// One placed image on the canvas.
#[derive(Debug, Clone)]
pub struct SceneObject {
    /// Stable identifier assigned at creation.
    pub id: ObjectId,
    /// The decoded image.
    pub raster: Raster,
    /// Top-left corner in canvas pixels.
    pub position: Point,
    /// Center as a fraction of canvas width and height. Within `[0, 1]`
    /// unless the object is larger than the canvas on that axis, in which
    /// case it is pinned at 0 and the fraction exceeds 0.5 accordingly
    /// (above 1 once the object is more than twice the canvas).
    pub fraction: Point,
    /// Placed size in canvas pixels (before `scale`).
    pub size: Size,
    /// Native image dimensions. Informational only.
    pub original_size: Size,
    /// Accumulated rotation in radians, clockwise.
    pub rotation: f64,
    /// Accumulated uniform scale multiplier.
    pub scale: f64,
    /// Whether this object is the current selection.
    pub selected: bool,
    /// Origin of the image, used for the product list.
    pub source: ObjectSource,
}

impl SceneObject {
    /// Center of the unscaled box.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.position.x + self.size.width / 2.0, self.position.y + self.size.height / 2.0)
    }

    /// Size after applying `scale`.
    #[must_use]
    pub fn scaled_size(&self) -> Size {
        self.size.scaled(self.scale)
    }
}

/// Size a newly added image should be placed at on a canvas of `canvas` size.
///
/// Images larger than the area budget are shrunk uniformly to fit it; images
/// whose smaller side is below the minimum are then grown uniformly until it
/// reaches the minimum. Aspect ratio is always preserved.
///
/// The minimum wins over the budget: a very thin image can end up above the
/// area budget so that its short side stays grabbable.
#[must_use]
pub fn placement_size(native: Size, canvas: Size) -> Size {
    let mut size = native;
    let budget = MAX_AREA_FRACTION * canvas.area();
    let area = native.area();
    if area > budget {
        size = native.scaled((budget / area).sqrt());
    }
    let smaller = size.width.min(size.height);
    if smaller < MIN_DIMENSION_PX {
        size = size.scaled(MIN_DIMENSION_PX / smaller);
    }
    size
}

/// Top-left implied by a center `fraction` on `canvas` for a box of `size`.
#[must_use]
pub fn position_from_fraction(fraction: Point, size: Size, canvas: Size) -> Point {
    Point::new(
        canvas.width * fraction.x - size.width / 2.0,
        canvas.height * fraction.y - size.height / 2.0,
    )
}

/// Clamp a proposed top-left into `canvas`, then derive the center fraction
/// from the clamped value. Returns `(position, fraction)`.
///
/// Objects larger than the canvas are pinned to the top-left edge; their
/// fraction is still the true center and may lie outside `[0, 1]`.
#[must_use]
pub fn settle(proposed: Point, size: Size, canvas: Size) -> (Point, Point) {
    let max_x = (canvas.width - size.width).max(0.0);
    let max_y = (canvas.height - size.height).max(0.0);
    let position = Point::new(proposed.x.clamp(0.0, max_x), proposed.y.clamp(0.0, max_y));
    let fraction = Point::new(
        (position.x + size.width / 2.0) / canvas.width,
        (position.y + size.height / 2.0) / canvas.height,
    );
    (position, fraction)
}

fn check_canvas(canvas: Size) -> Result<(), SceneError> {
    if canvas.is_degenerate() {
        return Err(SceneError::InvalidCanvas { width: canvas.width, height: canvas.height });
    }
    Ok(())
}

/// Ordered store of scene objects plus canvas size and selection.
#[derive(Debug, Clone)]
pub struct Scene {
    canvas: Size,
    objects: Vec<SceneObject>,
    selected: Option<ObjectId>,
}

impl Scene {
    /// Create an empty scene for a canvas of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidCanvas`] if either dimension is not a
    /// finite positive number.
    pub fn new(canvas: Size) -> Result<Self, SceneError> {
        check_canvas(canvas)?;
        Ok(Self { canvas, objects: Vec::new(), selected: None })
    }

    #[must_use]
    pub fn canvas_size(&self) -> Size {
        self.canvas
    }

    /// Objects in paint order, back to front.
    #[must_use]
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == *id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[must_use]
    pub fn selected_id(&self) -> Option<ObjectId> {
        self.selected
    }

    #[must_use]
    pub fn selected(&self) -> Option<&SceneObject> {
        self.selected.and_then(|id| self.get(&id))
    }

    fn index_of(&self, id: &ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| o.id == *id)
    }

    fn get_mut(&mut self, id: &ObjectId) -> Result<&mut SceneObject, SceneError> {
        self.objects
            .iter_mut()
            .find(|o| o.id == *id)
            .ok_or(SceneError::NotFound(*id))
    }

    /// Place a raster at the canvas center, sized by [`placement_size`], and
    /// append it as the frontmost object.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::EmptyImage`] if the raster has no area.
    pub fn add(&mut self, raster: Raster, source: ObjectSource) -> Result<ObjectId, SceneError> {
        let original_size = raster.size();
        if original_size.is_degenerate() {
            return Err(SceneError::EmptyImage);
        }
        let size = placement_size(original_size, self.canvas);
        let initial = Point::new(INITIAL_FRACTION, INITIAL_FRACTION);
        let (position, fraction) = settle(position_from_fraction(initial, size, self.canvas), size, self.canvas);
        let id = Uuid::new_v4();
        self.objects.push(SceneObject {
            id,
            raster,
            position,
            fraction,
            size,
            original_size,
            rotation: 0.0,
            scale: 1.0,
            selected: false,
            source,
        });
        Ok(id)
    }

    /// Make `id` the only selected object. Returns `false` if it does not exist.
    pub fn select(&mut self, id: &ObjectId) -> bool {
        if self.index_of(id).is_none() {
            return false;
        }
        for obj in &mut self.objects {
            obj.selected = obj.id == *id;
        }
        self.selected = Some(*id);
        true
    }

    /// Deselect everything. Returns `true` if something was selected.
    pub fn clear_selection(&mut self) -> bool {
        for obj in &mut self.objects {
            obj.selected = false;
        }
        self.selected.take().is_some()
    }

    /// Move an object's top-left to `proposed`, clamped into the canvas.
    /// Returns the final position.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NotFound`] for unknown ids and
    /// [`SceneError::InvalidPosition`] for non-finite coordinates.
    pub fn move_to(&mut self, id: &ObjectId, proposed: Point) -> Result<Point, SceneError> {
        if !(proposed.x.is_finite() && proposed.y.is_finite()) {
            return Err(SceneError::InvalidPosition { x: proposed.x, y: proposed.y });
        }
        let canvas = self.canvas;
        let obj = self.get_mut(id)?;
        let (position, fraction) = settle(proposed, obj.size, canvas);
        obj.position = position;
        obj.fraction = fraction;
        Ok(position)
    }

    /// Change the canvas size and reposition every object from its fraction.
    ///
    /// Returns `false` without touching any object when the size is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidCanvas`] for unusable sizes.
    pub fn resize_canvas(&mut self, canvas: Size) -> Result<bool, SceneError> {
        check_canvas(canvas)?;
        if canvas == self.canvas {
            return Ok(false);
        }
        self.canvas = canvas;
        for obj in &mut self.objects {
            let proposed = position_from_fraction(obj.fraction, obj.size, canvas);
            let (position, fraction) = settle(proposed, obj.size, canvas);
            obj.position = position;
            obj.fraction = fraction;
        }
        Ok(true)
    }

    /// Add `delta` radians to an object's rotation.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NotFound`] or [`SceneError::InvalidRotation`].
    pub fn rotate(&mut self, id: &ObjectId, delta: f64) -> Result<f64, SceneError> {
        if !delta.is_finite() {
            return Err(SceneError::InvalidRotation(delta));
        }
        let obj = self.get_mut(id)?;
        obj.rotation += delta;
        Ok(obj.rotation)
    }

    /// Multiply an object's scale by `factor`. Placement clamping is based on
    /// the unscaled size, so scaling never moves the object.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NotFound`] or [`SceneError::InvalidScale`].
    pub fn scale(&mut self, id: &ObjectId, factor: f64) -> Result<f64, SceneError> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(SceneError::InvalidScale(factor));
        }
        let obj = self.get_mut(id)?;
        let next = obj.scale * factor;
        if !(next.is_finite() && next > 0.0) {
            return Err(SceneError::InvalidScale(next));
        }
        obj.scale = next;
        Ok(next)
    }

    /// Remove an object, dropping the selection if it pointed at it.
    pub fn remove(&mut self, id: &ObjectId) -> Option<SceneObject> {
        let idx = self.index_of(id)?;
        if self.selected == Some(*id) {
            self.selected = None;
        }
        Some(self.objects.remove(idx))
    }

    /// Move an object to the end of the paint order. Returns `false` if absent.
    pub fn bring_to_front(&mut self, id: &ObjectId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let obj = self.objects.remove(idx);
        self.objects.push(obj);
        true
    }

    /// Move an object to the start of the paint order. Returns `false` if absent.
    pub fn send_to_back(&mut self, id: &ObjectId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let obj = self.objects.remove(idx);
        self.objects.insert(0, obj);
        true
    }

    /// Lay objects out row-major, `columns` per row, cell origins `pitch`
    /// apart starting at `(margin, margin)`. Each position is settled.
    pub fn arrange_grid(&mut self, columns: usize, pitch: f64, margin: f64) {
        let columns = columns.max(1);
        let canvas = self.canvas;
        for (i, obj) in self.objects.iter_mut().enumerate() {
            let proposed = Point::new(
                margin + (i % columns) as f64 * pitch,
                margin + (i / columns) as f64 * pitch,
            );
            let (position, fraction) = settle(proposed, obj.size, canvas);
            obj.position = position;
            obj.fraction = fraction;
        }
    }

    /// Remove every object and the selection. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        self.selected = None;
        let removed = self.objects.len();
        self.objects.clear();
        removed
    }

    /// Source URLs of all objects in paint order, skipping pasted images.
    #[must_use]
    pub fn source_urls(&self) -> Vec<&str> {
        self.objects.iter().filter_map(|o| o.source.url()).collect()
    }
}
