//! Engine: every scene operation plus the pointer and keyboard handlers.
//!
//! [`EngineCore`] is the single writer for one editing session. Each operation
//! mutates the scene and returns the [`Action`]s the host should process:
//! redraw requests, object lifecycle events, selection changes, and advisory
//! notices. Operations that need a selection are no-ops with an error notice
//! when nothing is selected.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use image::{Rgba, RgbaImage};

use crate::consts::{
    DEFAULT_BACKGROUND_RGBA, GRID_COLUMNS, GRID_MARGIN_PX, GRID_PITCH_PX, PLACEHOLDER_PNG, ROTATE_STEP_RAD,
    SCALE_DOWN_FACTOR, SCALE_UP_FACTOR,
};
use crate::doc::{ObjectId, ObjectSource, Scene, SceneError, SceneObject};
use crate::geom::{Point, Size};
use crate::hit;
use crate::input::{Button, InputState, Key, Modifiers};
use crate::notice::{self, Notice};
use crate::raster::Raster;
use crate::render::{self, ColorError};

/// Actions returned from engine operations for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The viewport should be redrawn.
    RenderNeeded,
    /// An object was appended to the scene.
    ObjectAdded { id: ObjectId },
    /// An object was removed from the scene.
    ObjectRemoved { id: ObjectId },
    /// The selection changed to the given object, or to nothing.
    SelectionChanged(Option<ObjectId>),
    /// An advisory event for the notification layer.
    Notify(Notice),
}

/// Tunable interaction policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Radians added by the rotate shortcut.
    pub rotate_step: f64,
    /// Scale multiplier for the grow shortcut.
    pub scale_up: f64,
    /// Scale multiplier for the shrink shortcut.
    pub scale_down: f64,
    /// Columns used by [`EngineCore::arrange_grid`].
    pub grid_columns: usize,
    /// Distance between grid cell origins.
    pub grid_pitch: f64,
    /// Offset of the first grid cell from the canvas corner.
    pub grid_margin: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rotate_step: ROTATE_STEP_RAD,
            scale_up: SCALE_UP_FACTOR,
            scale_down: SCALE_DOWN_FACTOR,
            grid_columns: GRID_COLUMNS,
            grid_pitch: GRID_PITCH_PX,
            grid_margin: GRID_MARGIN_PX,
        }
    }
}

/// A flattened export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composite {
    /// Encoded PNG bytes.
    pub png: Vec<u8>,
    /// True when the pipeline failed and `png` is the placeholder image.
    pub fallback: bool,
}

/// Core engine state for one editing session.
#[derive(Debug, Clone)]
pub struct EngineCore {
    pub scene: Scene,
    pub input: InputState,
    background: Option<Rgba<u8>>,
    config: EngineConfig,
}

fn notify(notice: Notice) -> Action {
    Action::Notify(notice)
}

fn select_first() -> Vec<Action> {
    vec![notify(Notice::error(notice::SELECT_FIRST))]
}

impl EngineCore {
    /// Create an engine for a canvas of the given size with default policy.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidCanvas`] for unusable sizes.
    pub fn new(width: f64, height: f64) -> Result<Self, SceneError> {
        Self::with_config(width, height, EngineConfig::default())
    }

    /// Create an engine with explicit policy.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidCanvas`] for unusable sizes.
    pub fn with_config(width: f64, height: f64, config: EngineConfig) -> Result<Self, SceneError> {
        Ok(Self {
            scene: Scene::new(Size::new(width, height))?,
            input: InputState::Idle,
            background: None,
            config,
        })
    }

    // --- Queries ---

    /// The currently selected object, if any.
    #[must_use]
    pub fn selection(&self) -> Option<ObjectId> {
        self.scene.selected_id()
    }

    /// Look up an object by id.
    #[must_use]
    pub fn object(&self, id: &ObjectId) -> Option<&SceneObject> {
        self.scene.get(id)
    }

    /// Objects in paint order, back to front.
    #[must_use]
    pub fn objects(&self) -> &[SceneObject] {
        self.scene.objects()
    }

    #[must_use]
    pub fn canvas_size(&self) -> Size {
        self.scene.canvas_size()
    }

    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// The fill used for redraws and exports: the configured background, or white.
    #[must_use]
    pub fn background(&self) -> Rgba<u8> {
        self.background.unwrap_or(Rgba(DEFAULT_BACKGROUND_RGBA))
    }

    // --- Scene operations ---

    /// Place a decoded image at the canvas center as the frontmost object.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::EmptyImage`] for images with no area.
    pub fn add_image(&mut self, raster: Raster, source: ObjectSource) -> Result<(ObjectId, Vec<Action>), SceneError> {
        let message = match &source {
            ObjectSource::Url(_) => notice::IMAGE_ADDED,
            ObjectSource::Pasted => notice::IMAGE_PASTED,
        };
        let id = self.scene.add(raster, source)?;
        if let Some(obj) = self.scene.get(&id) {
            tracing::info!(
                %id,
                width = obj.size.width,
                height = obj.size.height,
                count = self.scene.len(),
                "image added"
            );
        }
        Ok((id, vec![Action::ObjectAdded { id }, Action::RenderNeeded, notify(Notice::success(message))]))
    }

    /// Select the topmost object under `pt`. On a miss the selection is left
    /// untouched; clearing it is the caller's decision.
    pub fn hit_test(&mut self, pt: Point) -> Option<ObjectId> {
        let id = hit::hit_test(pt, &self.scene)?;
        self.scene.select(&id);
        Some(id)
    }

    /// Start dragging the selected object, remembering the pointer's offset
    /// from its top-left. No-op without a selection or while a drag is active.
    pub fn begin_drag(&mut self, pt: Point) -> bool {
        if self.input.is_dragging() {
            return false;
        }
        let Some(obj) = self.scene.selected() else {
            return false;
        };
        self.input = InputState::Dragging {
            id: obj.id,
            offset: Point::new(pt.x - obj.position.x, pt.y - obj.position.y),
        };
        true
    }

    /// Move the dragged object so the pointer keeps its grab offset.
    pub fn update_drag(&mut self, pt: Point) -> Vec<Action> {
        let InputState::Dragging { id, offset } = self.input else {
            return Vec::new();
        };
        match self.scene.move_to(&id, Point::new(pt.x - offset.x, pt.y - offset.y)) {
            Ok(_) => vec![Action::RenderNeeded],
            Err(SceneError::NotFound(_)) => {
                self.input = InputState::Idle;
                Vec::new()
            }
            Err(e) => {
                tracing::debug!(error = %e, "ignoring drag update");
                Vec::new()
            }
        }
    }

    /// Finish the active drag, if any.
    pub fn end_drag(&mut self) -> Vec<Action> {
        match self.input {
            InputState::Dragging { id, .. } => {
                self.input = InputState::Idle;
                if let Some(obj) = self.scene.get(&id) {
                    tracing::debug!(%id, x = obj.position.x, y = obj.position.y, "drag finished");
                }
                vec![Action::RenderNeeded]
            }
            InputState::Idle => Vec::new(),
        }
    }

    /// Move an object's top-left to `pt`, clamped into the canvas.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NotFound`] or [`SceneError::InvalidPosition`].
    pub fn move_object(&mut self, id: &ObjectId, pt: Point) -> Result<Vec<Action>, SceneError> {
        self.scene.move_to(id, pt)?;
        Ok(vec![Action::RenderNeeded])
    }

    /// Resize the working canvas and reposition every object from its
    /// fraction position.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidCanvas`] for unusable sizes.
    pub fn resize_canvas(&mut self, width: f64, height: f64) -> Result<Vec<Action>, SceneError> {
        if self.scene.resize_canvas(Size::new(width, height))? {
            tracing::debug!(width, height, objects = self.scene.len(), "canvas resized");
        }
        Ok(vec![Action::RenderNeeded])
    }

    /// Rotate the selected object by `delta` radians.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidRotation`] for non-finite angles.
    pub fn rotate_selected(&mut self, delta: f64) -> Result<Vec<Action>, SceneError> {
        let Some(id) = self.selection() else {
            return Ok(select_first());
        };
        self.scene.rotate(&id, delta)?;
        Ok(vec![Action::RenderNeeded, notify(Notice::success(notice::IMAGE_ROTATED))])
    }

    /// Multiply the selected object's scale by `factor`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidScale`] unless `factor` is finite and positive.
    pub fn scale_selected(&mut self, factor: f64) -> Result<Vec<Action>, SceneError> {
        let Some(id) = self.selection() else {
            return Ok(select_first());
        };
        self.scene.scale(&id, factor)?;
        Ok(vec![Action::RenderNeeded, notify(Notice::info(notice::IMAGE_SCALED))])
    }

    /// Remove the selected object.
    pub fn delete_selected(&mut self) -> Vec<Action> {
        let Some(id) = self.selection() else {
            return select_first();
        };
        let Some(removed) = self.scene.remove(&id) else {
            return select_first();
        };
        if self.input.dragged_id() == Some(id) {
            self.input = InputState::Idle;
        }
        tracing::info!(id = %removed.id, count = self.scene.len(), "image deleted");
        vec![
            Action::ObjectRemoved { id },
            Action::SelectionChanged(None),
            Action::RenderNeeded,
            notify(Notice::info(notice::IMAGE_DELETED)),
        ]
    }

    /// Move the selected object to the front of the paint order.
    pub fn bring_to_front(&mut self) -> Vec<Action> {
        match self.selection() {
            Some(id) if self.scene.bring_to_front(&id) => {
                vec![Action::RenderNeeded, notify(Notice::success(notice::BROUGHT_TO_FRONT))]
            }
            _ => select_first(),
        }
    }

    /// Move the selected object to the back of the paint order.
    pub fn send_to_back(&mut self) -> Vec<Action> {
        match self.selection() {
            Some(id) if self.scene.send_to_back(&id) => {
                vec![Action::RenderNeeded, notify(Notice::success(notice::SENT_TO_BACK))]
            }
            _ => select_first(),
        }
    }

    /// Remove every object and the selection.
    pub fn clear(&mut self) -> Vec<Action> {
        let had_selection = self.selection().is_some();
        let ids: Vec<ObjectId> = self.scene.objects().iter().map(|o| o.id).collect();
        let removed = self.scene.clear();
        self.input = InputState::Idle;
        tracing::info!(removed, "canvas cleared");

        let mut actions: Vec<Action> = ids.into_iter().map(|id| Action::ObjectRemoved { id }).collect();
        if had_selection {
            actions.push(Action::SelectionChanged(None));
        }
        actions.push(Action::RenderNeeded);
        actions.push(notify(Notice::info(notice::CANVAS_CLEARED)));
        actions
    }

    /// Lay every object out on the configured grid.
    pub fn arrange_grid(&mut self) -> Vec<Action> {
        self.scene
            .arrange_grid(self.config.grid_columns, self.config.grid_pitch, self.config.grid_margin);
        vec![Action::RenderNeeded]
    }

    /// Set the background from a CSS hex colour.
    ///
    /// # Errors
    ///
    /// Returns [`ColorError`] for malformed colours; the background is unchanged.
    pub fn set_background(&mut self, color: &str) -> Result<Vec<Action>, ColorError> {
        self.background = Some(render::parse_hex_color(color)?);
        Ok(vec![Action::RenderNeeded])
    }

    // --- Input events ---

    /// Primary-button press: select and start dragging the object under the
    /// pointer, or clear the selection when the press lands on empty canvas.
    pub fn on_pointer_down(&mut self, pt: Point, button: Button, _modifiers: Modifiers) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        let before = self.selection();
        match self.hit_test(pt) {
            Some(id) => {
                self.begin_drag(pt);
                let mut actions = Vec::new();
                if before != Some(id) {
                    actions.push(Action::SelectionChanged(Some(id)));
                }
                actions.push(Action::RenderNeeded);
                actions
            }
            None if self.scene.clear_selection() => {
                vec![Action::SelectionChanged(None), Action::RenderNeeded]
            }
            None => Vec::new(),
        }
    }

    pub fn on_pointer_move(&mut self, pt: Point, _modifiers: Modifiers) -> Vec<Action> {
        self.update_drag(pt)
    }

    pub fn on_pointer_up(&mut self, _pt: Point, button: Button, _modifiers: Modifiers) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        self.end_drag()
    }

    /// Pointer left the surface; an active drag ends where it is.
    pub fn on_pointer_leave(&mut self) -> Vec<Action> {
        self.end_drag()
    }

    /// Keyboard shortcuts: `Delete` removes, `r` rotates, `s`/`S` grow/shrink.
    /// Command chords and unknown keys are ignored.
    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers) -> Vec<Action> {
        if modifiers.has_command() {
            return Vec::new();
        }
        let result = match key.as_str() {
            "Delete" => Ok(self.delete_selected()),
            "r" => self.rotate_selected(self.config.rotate_step),
            "s" => self.scale_selected(self.config.scale_up),
            "S" => self.scale_selected(self.config.scale_down),
            _ => Ok(Vec::new()),
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, key = key.as_str(), "shortcut rejected");
            Vec::new()
        })
    }

    // --- Render / export ---

    /// Paint the interactive surface.
    #[must_use]
    pub fn render_viewport(&self) -> RgbaImage {
        render::draw_viewport(&self.scene, self.background())
    }

    /// Flatten the scene to a `width × height` PNG.
    ///
    /// Never fails: if the pipeline cannot produce an image (a cross-origin
    /// object tainted the surface, the target is unusable, or encoding
    /// failed) the placeholder PNG is returned with `fallback` set.
    pub fn export_composite(&self, width: u32, height: u32) -> (Composite, Vec<Action>) {
        match render::export_png(&self.scene, self.background(), width, height) {
            Ok(png) => {
                tracing::info!(width, height, bytes = png.len(), objects = self.scene.len(), "composite exported");
                (Composite { png, fallback: false }, vec![notify(Notice::success(notice::EXPORTED))])
            }
            Err(e) => {
                tracing::warn!(error = %e, width, height, "export failed; using placeholder");
                (
                    Composite { png: PLACEHOLDER_PNG.to_vec(), fallback: true },
                    vec![notify(Notice::info(notice::EXPORT_PLACEHOLDER))],
                )
            }
        }
    }
}
