//! Advisory events for the notification layer.
//!
//! Notices are output only: the host shows them and never feeds them back.

#[cfg(test)]
#[path = "notice_test.rs"]
mod notice_test;

use serde::{Deserialize, Serialize};

pub const IMAGE_ADDED: &str = "Image added successfully!";
pub const IMAGE_PASTED: &str = "Image pasted successfully!";
pub const IMAGE_DELETED: &str = "Image deleted";
pub const IMAGE_ROTATED: &str = "Image rotated!";
pub const IMAGE_SCALED: &str = "Image scaled";
pub const BROUGHT_TO_FRONT: &str = "Brought to front!";
pub const SENT_TO_BACK: &str = "Sent to back!";
pub const CANVAS_CLEARED: &str = "Canvas cleared";
pub const SELECT_FIRST: &str = "Please select an image first";
pub const LOAD_FAILED: &str = "Failed to load image. Please try a different URL.";
pub const PASTE_FAILED: &str = "Failed to load pasted image.";
pub const INVALID_URL: &str = "Please enter a valid URL";
pub const EMPTY_BOARD: &str = "Add at least one image to start creating";
pub const EXPORTED: &str = "Moodboard exported!";
pub const EXPORT_PLACEHOLDER: &str = "Export failed; a placeholder image was used.";
pub const PUBLISHED: &str = "Moodboard published successfully!";
pub const PUBLISH_FAILED: &str = "Failed to publish moodboard";

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

/// One advisory event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, message)
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Info, message)
    }
}
