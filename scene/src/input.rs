//! Input model: pointer buttons, keys, modifier keys, and the drag state machine.
//!
//! `InputState` tracks the one gesture that can be in progress between
//! pointer-down and pointer-up. Only a single drag may be active at a time.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::doc::ObjectId;
use crate::geom::Point;

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    /// Shift key is held.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

impl Modifiers {
    /// Whether a command chord (Ctrl or Meta) is held. Shortcuts are
    /// suppressed while one is, so host chords like copy/paste pass through.
    #[must_use]
    pub fn has_command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button.
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// A keyboard key, holding the key name as a browser reports it
/// (e.g. `"Delete"`, `"r"`, `"S"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Gesture state between pointer-down and pointer-up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InputState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// An object is following the pointer.
    Dragging {
        /// Object being dragged.
        id: ObjectId,
        /// Pointer position minus the object's top-left at drag start.
        offset: Point,
    },
}

impl InputState {
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging { .. })
    }

    /// The id of the object being dragged, if any.
    #[must_use]
    pub fn dragged_id(&self) -> Option<ObjectId> {
        match self {
            Self::Dragging { id, .. } => Some(*id),
            Self::Idle => None,
        }
    }
}
