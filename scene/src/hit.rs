#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::doc::{ObjectId, Scene, SceneObject};
use crate::geom::Point;

/// Circular hit region of an object: centered on its scaled box, radius half
/// the larger scaled side. Rotation is ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitCircle {
    pub center: Point,
    pub radius: f64,
}

impl HitCircle {
    /// The hit region for `obj`.
    ///
    /// The center is measured from the unscaled top-left, so scaling an object
    /// shifts its hit region down and to the right.
    #[must_use]
    pub fn of(obj: &SceneObject) -> Self {
        let scaled = obj.scaled_size();
        Self {
            center: Point::new(obj.position.x + scaled.width / 2.0, obj.position.y + scaled.height / 2.0),
            radius: scaled.width.max(scaled.height) / 2.0,
        }
    }

    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.distance(self.center) <= self.radius
    }
}

/// The topmost object whose hit circle contains `pt`, if any.
#[must_use]
pub fn hit_test(pt: Point, scene: &Scene) -> Option<ObjectId> {
    scene
        .objects()
        .iter()
        .rev()
        .find(|obj| HitCircle::of(obj).contains(pt))
        .map(|obj| obj.id)
}
